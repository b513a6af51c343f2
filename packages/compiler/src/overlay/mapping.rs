//! `buildTemplateMapping` (§4.7 "Mapping"): pairs overlay ranges back to
//! authored HTML spans, the bidirectional link [`crate::provenance`] indexes.

use crate::span::TextSpan;
use crate::template::instruction::BindingSource;

use super::emit::OverlaySource;

#[derive(Debug, Clone)]
pub struct MappingEntry {
    pub expr_id: crate::identity::ExprId,
    pub html_span: TextSpan,
    pub overlay_span: TextSpan,
    pub call_span: Option<TextSpan>,
    pub degraded: bool,
}

/// One expression-level entry plus its member-path entries, per overlay
/// offset record.
pub fn build_template_mapping(overlay: &OverlaySource, interpolation_groups: &[Vec<crate::identity::ExprId>]) -> Vec<MappingEntry> {
    let mut entries = Vec::new();

    for offset in &overlay.offsets {
        for member in &offset.member_spans {
            entries.push(MappingEntry {
                expr_id: offset.expr_id,
                html_span: member.html_span,
                overlay_span: member.overlay_span,
                call_span: Some(offset.call_span),
                degraded: member.degraded,
            });
        }
    }

    merge_interpolation_groups(entries, interpolation_groups)
}

/// Per §4.7: within one interpolation's segments, retain only leaf member
/// paths (drop any entry whose html span is a strict sub-range of another
/// retained entry's html span). Ties prefer an exact entry over a degraded
/// one, then a segment belonging to the expression earliest in the group
/// (its own member path over one from a sibling expression's projection),
/// then the shorter span, and only fall back to scan order once all of
/// that is exhausted.
fn merge_interpolation_groups(entries: Vec<MappingEntry>, groups: &[Vec<crate::identity::ExprId>]) -> Vec<MappingEntry> {
    let mut result = Vec::new();
    let mut consumed = vec![false; entries.len()];

    for group in groups {
        let indices: Vec<usize> = entries.iter().enumerate().filter(|(_, e)| group.contains(&e.expr_id)).map(|(i, _)| i).collect();
        if indices.len() < 2 {
            continue;
        }
        for &i in &indices {
            consumed[i] = true;
        }
        let kept = retain_leaf_paths(&entries, &indices);
        result.extend(kept);
    }

    for (i, entry) in entries.into_iter().enumerate() {
        if !consumed[i] {
            result.push(entry);
        }
    }
    result
}

fn retain_leaf_paths(entries: &[MappingEntry], indices: &[usize]) -> Vec<MappingEntry> {
    // Stable order in which each expression first appears in this group;
    // an entry belonging to an earlier expression outranks one belonging
    // to a later sibling on an otherwise-tied span.
    let mut expr_order: Vec<crate::identity::ExprId> = Vec::new();
    for &i in indices {
        let id = entries[i].expr_id;
        if !expr_order.contains(&id) {
            expr_order.push(id);
        }
    }
    let expr_rank = |id: crate::identity::ExprId| expr_order.iter().position(|x| *x == id).unwrap_or(usize::MAX);

    let mut keep = Vec::new();
    for (pos, &i) in indices.iter().enumerate() {
        let e = &entries[i];
        let mut dominated = false;
        for (other_pos, &j) in indices.iter().enumerate() {
            if i == j {
                continue;
            }
            let f = &entries[j];
            if spans_strictly_contains(f.html_span, e.html_span) {
                dominated = true;
                break;
            }
            if f.html_span == e.html_span {
                let f_wins = match (!f.degraded, !e.degraded) {
                    (true, false) => true,
                    (false, true) => false,
                    _ => match expr_rank(f.expr_id).cmp(&expr_rank(e.expr_id)) {
                        std::cmp::Ordering::Less => true,
                        std::cmp::Ordering::Greater => false,
                        std::cmp::Ordering::Equal => match f.html_span.len().cmp(&e.html_span.len()) {
                            std::cmp::Ordering::Less => true,
                            std::cmp::Ordering::Greater => false,
                            std::cmp::Ordering::Equal => other_pos < pos,
                        },
                    },
                };
                if f_wins {
                    dominated = true;
                    break;
                }
            }
        }
        if !dominated {
            keep.push(clone_entry(e));
        }
    }
    keep
}

fn spans_strictly_contains(outer: TextSpan, inner: TextSpan) -> bool {
    outer.start <= inner.start && outer.end >= inner.end && outer.len() > inner.len()
}

fn clone_entry(e: &MappingEntry) -> MappingEntry {
    MappingEntry { expr_id: e.expr_id, html_span: e.html_span, overlay_span: e.overlay_span, call_span: e.call_span, degraded: e.degraded }
}

/// Collect interpolation groups from a module's instruction rows: every
/// `BindingSource::Interp` on a single row is one group of `ExprId`s whose
/// member paths should be merged together.
pub fn interpolation_groups_from_sources<'a>(sources: impl Iterator<Item = &'a BindingSource>) -> Vec<Vec<crate::identity::ExprId>> {
    sources
        .filter_map(|s| match s {
            BindingSource::Interp { exprs, .. } if exprs.len() > 1 => Some(exprs.iter().map(|e| e.id).collect()),
            _ => None,
        })
        .collect()
}
