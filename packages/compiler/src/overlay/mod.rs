//! Overlay Synthesis (C8): plan a synthetic TypeScript-ish source per frame,
//! emit it, and build the bidirectional span mapping provenance indexes
//! (§4.7).

pub mod emit;
pub mod mapping;
pub mod plan;

pub use emit::{emit, EmitMode, MemberSpan, OverlayOffset, OverlaySource};
pub use mapping::{build_template_mapping, interpolation_groups_from_sources, MappingEntry};
pub use plan::{plan, FrameDescriptor, OverlayPlan};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SourceFileId;
    use crate::scope::bind;
    use crate::template::instruction::Instruction;
    use crate::template::lower::{lower_template, LowerOptions};

    #[test]
    fn plans_one_frame_per_scope_and_emits_access_calls() {
        let module = lower_template(r#"<div>${name}</div>"#, LowerOptions { file: Some(SourceFileId::new("/t.html")), name: None });
        let scope = bind(&module, "App");
        let overlay_plan = plan(&module, &scope);
        assert!(overlay_plan.frames.iter().any(|f| !f.lambdas.is_empty()));

        let source = emit(&module, &overlay_plan, EmitMode::HostTyped, "");
        assert!(source.text.contains("__au$access<Frame0>(o => o.name)"));
        assert_eq!(source.offsets.len(), 1);
    }

    #[test]
    fn dynamic_mode_annotates_param_with_jsdoc() {
        let module = lower_template(r#"<div>${name}</div>"#, LowerOptions { file: Some(SourceFileId::new("/t.html")), name: None });
        let scope = bind(&module, "App");
        let overlay_plan = plan(&module, &scope);
        let source = emit(&module, &overlay_plan, EmitMode::Dynamic, "");
        assert!(source.text.contains("@param {App} o"));
    }

    #[test]
    fn repeat_introduces_a_distinct_frame_type() {
        let module = lower_template(r#"<li repeat.for="item of items">${item.name}</li>"#, LowerOptions { file: Some(SourceFileId::new("/t.html")), name: None });
        let scope = bind(&module, "App");
        let overlay_plan = plan(&module, &scope);
        assert!(overlay_plan.frames.len() >= 2);
        let repeat_frame = overlay_plan.frames.iter().find(|f| f.type_expr.contains("item")).expect("repeat frame");
        assert!(repeat_frame.type_expr.contains("$index"));
    }

    #[test]
    fn interpolation_member_segments_merge_to_leaf_paths() {
        let module = lower_template(r#"<div>${user.name} ${user.name.first}</div>"#, LowerOptions { file: Some(SourceFileId::new("/t.html")), name: None });
        let root = module.template(&module.root).unwrap();
        let interp_source = root
            .rows
            .iter()
            .flat_map(|r| &r.instructions)
            .find_map(|i| match i {
                Instruction::TextBinding { from } => Some(from),
                _ => None,
            })
            .expect("text binding");
        let groups = interpolation_groups_from_sources(std::iter::once(interp_source));

        let scope = bind(&module, "App");
        let overlay_plan = plan(&module, &scope);
        let source = emit(&module, &overlay_plan, EmitMode::HostTyped, "");
        let mapping = build_template_mapping(&source, &groups);

        // `user.name` is a prefix of `user.name.first`'s deeper path for the
        // first expression, and the two expressions share `user`/`user.name`
        // text; the merge must not retain both a span and its own prefix.
        for entry in &mapping {
            let shorter_is_prefix_of_another = mapping.iter().any(|other| {
                other.html_span != entry.html_span
                    && other.html_span.start <= entry.html_span.start
                    && other.html_span.end >= entry.html_span.end
            });
            assert!(!shorter_is_prefix_of_another, "retained a dominated span: {:?}", entry.html_span);
        }
    }
}
