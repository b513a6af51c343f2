//! Query operations over a [`super::Compilation`] (§4.10 "Query
//! operations"): `nodeAt`, `exprAt`, `controllerAt`, `bindablesFor`,
//! `expectedTypeOf`, `completions`, `hover`, `definition`, `references`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::identity::{ExprId, NodeId, SourceFileId, TemplateId};
use crate::project::Bindable;
use crate::resolve::TargetSem;
use crate::span::SourceSpan;
use crate::template::dom::{DomNode, Origin};
use crate::template::instruction::BindingSource;

use super::Compilation;

/// The node whose span most narrowly contains `offset`, across every
/// template in the compilation (root plus controller/branch/projection
/// splits).
pub fn node_at(comp: &Compilation, offset: u32) -> Option<NodeId> {
    let mut best: Option<(crate::span::TextSpan, NodeId)> = None;
    for template in &comp.module.templates {
        // `<=` rather than `<`: a pre-order walk visits a node before its
        // children, and a wrapping synthetic root template's span often
        // coincides exactly with its sole child's span, so ties must favor
        // the deeper (later-visited) node to land on the real element.
        template.dom.walk(&mut |node| {
            let loc = node.loc();
            if loc.contains_inclusive(offset) && best.as_ref().map_or(true, |(b, _)| loc.len() <= b.len()) {
                best = Some((loc, node.id().clone()));
            }
        });
    }
    best.map(|(_, id)| id)
}

/// The narrowest expression-table entry whose span contains `offset`.
pub fn expr_at(comp: &Compilation, offset: u32) -> Option<ExprId> {
    let mut best: Option<(crate::span::TextSpan, ExprId)> = None;
    for entry in &comp.module.expr_table {
        if entry.span.contains_inclusive(offset) && best.as_ref().map_or(true, |(b, _)| entry.span.len() < b.len()) {
            best = Some((entry.span, entry.id));
        }
    }
    best.map(|(_, id)| id)
}

/// The nested template (controller/branch split) whose host node's span
/// contains `offset` in its owning template.
pub fn controller_at(comp: &Compilation, offset: u32) -> Option<TemplateId> {
    for template in &comp.module.templates {
        let host = match &template.origin {
            Origin::Controller { host, .. } => Some(host),
            Origin::Branch { host, .. } => Some(host),
            _ => None,
        };
        let host = host?;
        let owning = comp.module.template(&host.template)?;
        let node = owning.dom.find(&host.node)?;
        if node.loc().contains_inclusive(offset) {
            return Some(template.id.clone());
        }
    }
    None
}

pub(super) fn find_tag<'a>(comp: &'a Compilation, node_id: &NodeId) -> Option<&'a str> {
    for template in &comp.module.templates {
        if let Some(found) = template.dom.find(node_id) {
            if let DomNode::Element { tag, .. } = found {
                return Some(tag.as_str());
            }
        }
    }
    None
}

fn node_loc(comp: &Compilation, node_id: &NodeId) -> Option<crate::span::TextSpan> {
    comp.module.templates.iter().find_map(|t| t.dom.find(node_id)).map(|n| n.loc())
}

/// The bindables declared on `node`'s resource, or an empty list if the
/// node isn't a known custom element/attribute host.
pub fn bindables_for(comp: &Compilation, node: &NodeId) -> Vec<Bindable> {
    find_tag(comp, node).and_then(|tag| comp.semantics.find_by_name(tag)).map(|r| r.bindables.clone()).unwrap_or_default()
}

/// The target type an expression is checked against, per the instruction
/// that consumes it. Interpolation segments report `"string"` (their
/// implicit coercion) rather than their owning instruction's target type,
/// matching the type checker's own treatment of interpolation.
pub fn expected_type_of(comp: &Compilation, expr: ExprId) -> Option<String> {
    for row in comp.linked_rows.iter() {
        for instr in &row.instructions {
            match &instr.from {
                Some(BindingSource::ExprRef(r)) if r.id == expr => return Some(instr.target.expected_type().to_string()),
                Some(BindingSource::Interp { exprs, .. }) if exprs.iter().any(|e| e.id == expr) => return Some("string".to_string()),
                _ => {}
            }
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConfidenceRank {
    Exact,
    High,
    Partial,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OriginRank {
    Source,
    Config,
    Builtin,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionItem {
    pub label: String,
    pub confidence: ConfidenceRank,
    pub origin: OriginRank,
    pub sort_text: Option<String>,
}

/// §4.10 "Completions order by `(confidenceRank, originRank,
/// sortText|label, label)` and dedupe by label." A known element/attribute
/// host at `offset` contributes its own bindables at `Exact`/`Source`;
/// every declared resource in the project is offered as a fallback at
/// `Partial`/`Source`.
pub fn completions(comp: &Compilation, offset: u32) -> Vec<CompletionItem> {
    let mut items = Vec::new();

    if let Some(node_id) = node_at(comp, offset) {
        for bindable in bindables_for(comp, &node_id) {
            items.push(CompletionItem { label: bindable.attribute.clone(), confidence: ConfidenceRank::Exact, origin: OriginRank::Source, sort_text: None });
        }
    }
    for resource in &comp.semantics.resources {
        items.push(CompletionItem { label: resource.name.clone(), confidence: ConfidenceRank::Partial, origin: OriginRank::Source, sort_text: None });
    }

    items.sort_by(|a, b| {
        let key = |i: &CompletionItem| (i.confidence, i.origin, i.sort_text.clone().unwrap_or_else(|| i.label.clone()), i.label.clone());
        key(a).cmp(&key(b))
    });

    let mut seen = HashSet::new();
    items.retain(|i| seen.insert(i.label.clone()));
    items
}

/// A short human-readable description of the symbol at `offset`: the
/// expression's expected type if one covers it, otherwise the DOM node's
/// own identity.
pub fn hover(comp: &Compilation, offset: u32) -> Option<String> {
    if let Some(expr_id) = expr_at(comp, offset) {
        let expected = expected_type_of(comp, expr_id).unwrap_or_else(|| "unknown".to_string());
        return Some(format!("{}: {}", expr_id, expected));
    }
    node_at(comp, offset).map(|id| id.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionTarget {
    pub resource_name: String,
    pub class_name: String,
    pub kind: String,
}

fn definition_for_target(target: &TargetSem, comp: &Compilation) -> Option<DefinitionTarget> {
    let resource_name = match target {
        TargetSem::ElementBindable { resource, .. } | TargetSem::AttributeBindable { resource, .. } | TargetSem::ControllerProp { resource, .. } => resource,
        TargetSem::ElementNativeProp { .. } | TargetSem::Style { .. } | TargetSem::Unknown => return None,
    };
    let resource = comp.semantics.find_by_name(resource_name)?;
    Some(DefinitionTarget { resource_name: resource.name.clone(), class_name: resource.class_name.clone(), kind: resource.kind.clone() })
}

/// The resource declaration backing the symbol at `offset`: the binding
/// target if `offset` sits on a row with a resolved instruction, otherwise
/// the element's own tag if it names a known resource.
pub fn definition(comp: &Compilation, offset: u32) -> Option<DefinitionTarget> {
    let node_id = node_at(comp, offset)?;
    for row in comp.linked_rows.iter() {
        if row.node.as_ref() == Some(&node_id) {
            for instr in &row.instructions {
                if let Some(def) = definition_for_target(&instr.target, comp) {
                    return Some(def);
                }
            }
        }
    }
    let tag = find_tag(comp, &node_id)?;
    let resource = comp.semantics.find_by_name(tag)?;
    Some(DefinitionTarget { resource_name: resource.name.clone(), class_name: resource.class_name.clone(), kind: resource.kind.clone() })
}

/// Every DOM location in this document whose resolved instruction targets
/// the same resource as `offset`'s own definition.
pub fn references(comp: &Compilation, offset: u32) -> Vec<SourceSpan> {
    let Some(def) = definition(comp, offset) else { return Vec::new() };
    let file = SourceFileId::new(comp.uri.0.clone());
    let mut out = Vec::new();
    for row in comp.linked_rows.iter() {
        let matches = row.instructions.iter().any(|i| target_names_resource(&i.target, &def.resource_name));
        if !matches {
            continue;
        }
        if let Some(node_id) = &row.node {
            if let Some(loc) = node_loc(comp, node_id) {
                out.push(SourceSpan::new(loc, Some(file.clone())));
            }
        }
    }
    out
}

fn target_names_resource(target: &TargetSem, name: &str) -> bool {
    match target {
        TargetSem::ElementBindable { resource, .. } | TargetSem::AttributeBindable { resource, .. } | TargetSem::ControllerProp { resource, .. } => resource == name,
        TargetSem::ElementNativeProp { .. } | TargetSem::Style { .. } | TargetSem::Unknown => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::EmitMode;
    use crate::project::canonical::CanonicalSourceId;
    use crate::project::{RegistrationGraph, ResourceDef, ResourceGraph};
    use crate::project::ProjectSemantics;
    use crate::provenance::Uri;
    use crate::workspace::{Workspace, WorkspaceOptions};

    fn semantics_with_greeter() -> ProjectSemantics {
        ProjectSemantics {
            resources: vec![ResourceDef {
                id: CanonicalSourceId::new("project-discovery", None, "/g.ts", "Greeter", "custom-element", "greeter", None, None),
                kind: "custom-element".to_string(),
                name: "greeter".to_string(),
                class_name: "Greeter".to_string(),
                containerless: false,
                bindables: vec![Bindable { name: "name".to_string(), ty: "string".to_string(), mode: "toView".to_string(), attribute: "name".to_string(), required: false }],
                sibling_template: None,
            }],
            registration: RegistrationGraph::default(),
            graph: ResourceGraph::default(),
            diags: Vec::new(),
        }
    }

    fn workspace() -> (Workspace, Uri) {
        let mut options = WorkspaceOptions::default();
        options.overlay_mode = EmitMode::HostTyped;
        let mut ws = Workspace::new(semantics_with_greeter(), options);
        let uri = Uri("/app.html".to_string());
        ws.open_document(uri.clone(), r#"<greeter name.bind="who"></greeter>"#);
        (ws, uri)
    }

    #[test]
    fn node_at_finds_the_narrowest_covering_node() {
        let (mut ws, uri) = workspace();
        let comp = ws.get_compilation(&uri).unwrap();
        let node = node_at(&comp, 1).expect("node at offset 1");
        assert_eq!(find_tag(&comp, &node), Some("greeter"));
    }

    #[test]
    fn bindables_for_reports_the_element_s_resource_bindables() {
        let (mut ws, uri) = workspace();
        let comp = ws.get_compilation(&uri).unwrap();
        let node = node_at(&comp, 1).unwrap();
        let bindables = bindables_for(&comp, &node);
        assert_eq!(bindables.len(), 1);
        assert_eq!(bindables[0].name, "name");
    }

    #[test]
    fn expected_type_of_reports_the_resolved_bindable_type() {
        let (mut ws, uri) = workspace();
        let comp = ws.get_compilation(&uri).unwrap();
        let expr = comp.module.expr_table[0].id;
        assert_eq!(expected_type_of(&comp, expr), Some("string".to_string()));
    }

    #[test]
    fn definition_resolves_the_bound_resource() {
        let (mut ws, uri) = workspace();
        let comp = ws.get_compilation(&uri).unwrap();
        let def = definition(&comp, 1).expect("definition at the element");
        assert_eq!(def.resource_name, "greeter");
        assert_eq!(def.class_name, "Greeter");
    }

    #[test]
    fn completions_put_exact_source_bindables_before_partial_fallbacks() {
        let (mut ws, uri) = workspace();
        let comp = ws.get_compilation(&uri).unwrap();
        let items = completions(&comp, 1);
        assert_eq!(items[0].confidence, ConfidenceRank::Exact);
        assert!(items.iter().any(|i| i.label == "greeter"));
    }
}
