//! Provenance Index (C9): bidirectional edges between generated overlay
//! offsets and authored template offsets (§4.8).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::identity::ExprId;
use crate::overlay::MappingEntry;
use crate::span::TextSpan;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Uri(pub String);

/// One provenance edge. `member_path` distinguishes a whole-expression edge
/// (`None`) from a finer member-access edge, consulted by
/// [`ProvenanceIndex::lookup_generated`]/[`lookup_source`] to prefer the
/// narrowest hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub generated_uri: Uri,
    pub generated_span: TextSpan,
    pub source_uri: Uri,
    pub source_span: TextSpan,
    pub expr_id: ExprId,
    pub degraded: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ProvenanceIndex {
    edges: Vec<Edge>,
    /// `(uri, edge index)` buckets, so `findByGenerated`/`findBySource` don't
    /// scan the whole edge list per lookup.
    by_generated_uri: HashMap<Uri, Vec<usize>>,
    by_source_uri: HashMap<Uri, Vec<usize>>,
}

impl ProvenanceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert every mapping entry for one `(templateUri, overlayUri)` pair.
    /// A newer compilation's edges supersede older edges for the same pair
    /// (§5 "Ordering"): callers should `remove_document` first when
    /// recompiling.
    pub fn insert_mapping(&mut self, template_uri: &Uri, overlay_uri: &Uri, entries: &[MappingEntry]) {
        for entry in entries {
            self.add_edge(Edge {
                generated_uri: overlay_uri.clone(),
                generated_span: entry.overlay_span,
                source_uri: template_uri.clone(),
                source_span: entry.html_span,
                expr_id: entry.expr_id,
                degraded: entry.degraded,
            });
        }
    }

    fn add_edge(&mut self, edge: Edge) {
        let idx = self.edges.len();
        self.by_generated_uri.entry(edge.generated_uri.clone()).or_default().push(idx);
        self.by_source_uri.entry(edge.source_uri.clone()).or_default().push(idx);
        self.edges.push(edge);
    }

    /// Purge every edge whose generated or source uri matches `uri`, e.g. on
    /// `removeDocument(uri)`.
    pub fn remove_document(&mut self, uri: &Uri) {
        self.edges.retain(|e| &e.generated_uri != uri && &e.source_uri != uri);
        self.rebuild_buckets();
    }

    fn rebuild_buckets(&mut self) {
        self.by_generated_uri.clear();
        self.by_source_uri.clear();
        for (idx, edge) in self.edges.iter().enumerate() {
            self.by_generated_uri.entry(edge.generated_uri.clone()).or_default().push(idx);
            self.by_source_uri.entry(edge.source_uri.clone()).or_default().push(idx);
        }
    }

    pub fn find_by_generated(&self, uri: &Uri, offset: u32) -> Vec<&Edge> {
        self.by_generated_uri
            .get(uri)
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i])
            .filter(|e| e.generated_span.contains_inclusive(offset))
            .collect()
    }

    pub fn find_by_source(&self, uri: &Uri, offset: u32) -> Vec<&Edge> {
        self.by_source_uri
            .get(uri)
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i])
            .filter(|e| e.source_span.contains_inclusive(offset))
            .collect()
    }

    /// Narrowest generated-side hit covering `offset`, preferring a
    /// member-level edge over an expression-level one (a member edge's
    /// `generated_span` is a strict sub-range of its expression's).
    pub fn lookup_generated(&self, uri: &Uri, offset: u32) -> Option<&Edge> {
        let candidates = self.find_by_generated(uri, offset);
        let spans: Vec<TextSpan> = candidates.iter().map(|e| e.generated_span).collect();
        let narrowest = TextSpan::narrowest_containing(offset, spans.iter())?;
        candidates.into_iter().find(|e| e.generated_span == *narrowest)
    }

    pub fn lookup_source(&self, uri: &Uri, offset: u32) -> Option<&Edge> {
        let candidates = self.find_by_source(uri, offset);
        let spans: Vec<TextSpan> = candidates.iter().map(|e| e.source_span).collect();
        let narrowest = TextSpan::narrowest_containing(offset, spans.iter())?;
        candidates.into_iter().find(|e| e.source_span == *narrowest)
    }
}

/// Policy for degraded/missing mappings (§4.8 "Policy for degraded
/// mappings"). Defaults to retrying once and not requiring an exact span
/// outside reference lookups.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProjectionPolicy {
    pub retry_materialize_on_miss: bool,
    pub require_exact_mapped_span: bool,
}

impl Default for ProjectionPolicy {
    fn default() -> Self {
        ProjectionPolicy { retry_materialize_on_miss: true, require_exact_mapped_span: false }
    }
}

#[derive(Debug, Clone)]
pub enum Located {
    Exact(TextSpan),
    Degraded(TextSpan),
    WholeTemplate,
    Missing,
}

/// Resolve a diagnostic's generated-side location to a source location per
/// `policy`. `retry` is the caller's re-attempt after materializing the
/// overlay once on a first miss; `None` if it never retried.
pub fn resolve_diagnostic_location(index: &ProvenanceIndex, uri: &Uri, offset: u32, policy: ProjectionPolicy, retry: Option<&ProvenanceIndex>) -> Located {
    if let Some(edge) = index.lookup_generated(uri, offset) {
        return if edge.degraded { Located::Degraded(edge.source_span) } else { Located::Exact(edge.source_span) };
    }
    if policy.retry_materialize_on_miss {
        if let Some(retried) = retry {
            if let Some(edge) = retried.lookup_generated(uri, offset) {
                return if edge.degraded { Located::Degraded(edge.source_span) } else { Located::Exact(edge.source_span) };
            }
        }
    }
    Located::WholeTemplate
}

/// `"reference"` lookups (find references, go-to-definition) drop degraded
/// spans unless the caller has opted out of requiring an exact span.
pub fn resolve_reference_location(index: &ProvenanceIndex, uri: &Uri, offset: u32, policy: ProjectionPolicy) -> Located {
    match index.lookup_generated(uri, offset) {
        Some(edge) if edge.degraded && policy.require_exact_mapped_span => Located::Missing,
        Some(edge) => Located::Exact(edge.source_span),
        None => Located::Missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(expr: u64, html_start: u32, html_end: u32, overlay_start: u32, overlay_end: u32, degraded: bool) -> MappingEntry {
        MappingEntry {
            expr_id: ExprId(expr),
            html_span: TextSpan::new(html_start, html_end),
            overlay_span: TextSpan::new(overlay_start, overlay_end),
            call_span: None,
            degraded,
        }
    }

    #[test]
    fn prefers_narrowest_generated_hit() {
        let mut index = ProvenanceIndex::new();
        let template = Uri("t.html".to_string());
        let overlay = Uri("t.overlay.ts".to_string());
        index.insert_mapping(&template, &overlay, &[entry(1, 0, 20, 0, 20, false), entry(1, 5, 9, 5, 9, false)]);
        let hit = index.lookup_generated(&overlay, 6).unwrap();
        assert_eq!(hit.generated_span, TextSpan::new(5, 9));
    }

    #[test]
    fn remove_document_purges_both_sides() {
        let mut index = ProvenanceIndex::new();
        let template = Uri("t.html".to_string());
        let overlay = Uri("t.overlay.ts".to_string());
        index.insert_mapping(&template, &overlay, &[entry(1, 0, 10, 0, 10, false)]);
        index.remove_document(&template);
        assert!(index.lookup_generated(&overlay, 5).is_none());
    }

    #[test]
    fn reference_lookup_drops_degraded_span_by_default() {
        let mut index = ProvenanceIndex::new();
        let template = Uri("t.html".to_string());
        let overlay = Uri("t.overlay.ts".to_string());
        index.insert_mapping(&template, &overlay, &[entry(1, 0, 10, 0, 10, true)]);
        let policy = ProjectionPolicy { require_exact_mapped_span: true, ..ProjectionPolicy::default() };
        let located = resolve_reference_location(&index, &overlay, 5, policy);
        assert!(matches!(located, Located::Missing));
    }
}
