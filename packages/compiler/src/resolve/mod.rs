//! Host Resolution (C5): link each IR instruction's binding target against
//! the resource catalog produced by project discovery (§4.4).

use serde::{Deserialize, Serialize};

use crate::diagnostics::RawDiagnostic;
use crate::identity::{NodeId, SourceFileId};
use crate::project::ProjectSemantics;
use crate::span::{SourceSpan, TextSpan};
use crate::template::instruction::{BindingSource, Instruction, InstructionRow};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum TargetSem {
    ElementBindable { resource: String, bindable: String, ty: String },
    AttributeBindable { resource: String, bindable: String, ty: String },
    ControllerProp { resource: String, prop: String },
    ElementNativeProp { prop: String },
    Style { prop: String },
    Unknown,
}

impl TargetSem {
    pub fn expected_type(&self) -> &str {
        match self {
            TargetSem::ElementBindable { ty, .. } | TargetSem::AttributeBindable { ty, .. } => ty,
            TargetSem::ElementNativeProp { .. } | TargetSem::Style { .. } | TargetSem::ControllerProp { .. } => "unknown",
            TargetSem::Unknown => "unknown",
        }
    }
}

/// The IR instruction plus its resolved target. `from` is `None` for
/// instructions with no binding source of their own (e.g. `ref`, `set*`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedInstruction {
    pub target: TargetSem,
    pub from: Option<BindingSource>,
    pub original: Instruction,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkedRow {
    pub node: Option<NodeId>,
    pub instructions: Vec<LinkedInstruction>,
}

/// `resolve`'s full artifact: every row it linked plus every diagnostic
/// raised while linking them (e.g. `aurelia/unknown-bindable`). Kept
/// together so a caller can never thread the rows through without also
/// threading the diagnostics that accompany them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolveOutput {
    pub rows: Vec<LinkedRow>,
    pub diags: Vec<RawDiagnostic>,
}

/// Resolve every instruction on `row` against `semantics`. `host_tag` is the
/// owning element's tag name, used to look up element bindables; it is
/// `None` for rows belonging to synthetic anchor nodes (template controller
/// markers, `<let>`). `host_span` anchors diagnostics that describe the
/// element as a whole (e.g. a missing required bindable) rather than one
/// instruction's own expression. `file` is attached to any diagnostic span
/// raised along the way.
pub fn resolve_row(row: &InstructionRow, semantics: &ProjectSemantics, host_tag: Option<&str>, host_span: Option<TextSpan>, file: Option<&SourceFileId>, diags: &mut Vec<RawDiagnostic>) -> LinkedRow {
    let instructions: Vec<LinkedInstruction> = row.instructions.iter().map(|instr| resolve_instruction(instr, semantics, host_tag, file, diags)).collect();

    if let Some(tag) = host_tag {
        if let Some(resource) = semantics.find_by_name(tag) {
            if resource.kind == "custom-element" {
                let bound: std::collections::HashSet<&str> =
                    instructions.iter().filter_map(|i| match &i.target { TargetSem::ElementBindable { bindable, .. } => Some(bindable.as_str()), _ => None }).collect();
                for b in resource.bindables.iter().filter(|b| b.required && !bound.contains(b.name.as_str())) {
                    diags.push(
                        RawDiagnostic::new("aurelia/missing-required-bindable", format!("`{}` requires the bindable `{}`", tag, b.name))
                            .with_span(SourceSpan::new(host_span.unwrap_or_else(|| TextSpan::new(0, 0)), file.cloned())),
                    );
                }
            }
        }
    }

    LinkedRow { node: Some(row.target.clone()), instructions }
}

fn resolve_instruction(instr: &Instruction, semantics: &ProjectSemantics, host_tag: Option<&str>, file: Option<&SourceFileId>, diags: &mut Vec<RawDiagnostic>) -> LinkedInstruction {
    match instr {
        Instruction::PropertyBinding { to, from, .. } => {
            LinkedInstruction { target: resolve_property_target(to, host_tag, semantics), from: Some(from.clone()), original: instr.clone() }
        }
        Instruction::AttributeBinding { attr, from, .. } => {
            LinkedInstruction { target: resolve_attribute_target(attr, from, semantics, file, diags), from: Some(from.clone()), original: instr.clone() }
        }
        Instruction::StylePropertyBinding { to, from } => {
            LinkedInstruction { target: TargetSem::Style { prop: to.clone() }, from: Some(from.clone()), original: instr.clone() }
        }
        Instruction::ListenerBinding { from, .. } => {
            LinkedInstruction { target: TargetSem::ElementNativeProp { prop: "Function".to_string() }, from: Some(from.clone()), original: instr.clone() }
        }
        Instruction::RefBinding { .. } | Instruction::SetAttribute { .. } | Instruction::SetClassAttribute { .. } | Instruction::SetStyleAttribute { .. } | Instruction::SetProperty { .. } => {
            LinkedInstruction { target: TargetSem::Unknown, from: None, original: instr.clone() }
        }
        Instruction::TextBinding { from } => LinkedInstruction { target: TargetSem::ElementNativeProp { prop: "textContent".to_string() }, from: Some(from.clone()), original: instr.clone() },
        Instruction::HydrateTemplateController { res, .. } => {
            LinkedInstruction { target: TargetSem::ControllerProp { resource: res.clone(), prop: "value".to_string() }, from: None, original: instr.clone() }
        }
        Instruction::HydrateElement { res, .. } => LinkedInstruction { target: TargetSem::ControllerProp { resource: res.clone(), prop: "element".to_string() }, from: None, original: instr.clone() },
        Instruction::HydrateAttribute { res, .. } => LinkedInstruction { target: TargetSem::ControllerProp { resource: res.clone(), prop: "attribute".to_string() }, from: None, original: instr.clone() },
        Instruction::HydrateLetElement { .. } => LinkedInstruction { target: TargetSem::Unknown, from: None, original: instr.clone() },
    }
}

fn resolve_property_target(to: &str, host_tag: Option<&str>, semantics: &ProjectSemantics) -> TargetSem {
    if let Some(tag) = host_tag {
        if let Some(resource) = semantics.find_by_name(tag) {
            if resource.kind == "custom-element" {
                if let Some(b) = resource.bindables.iter().find(|b| b.name == to || b.attribute == to) {
                    return TargetSem::ElementBindable { resource: resource.name.clone(), bindable: b.name.clone(), ty: b.ty.clone() };
                }
            }
        }
    }
    TargetSem::ElementNativeProp { prop: to.to_string() }
}

fn resolve_attribute_target(attr: &str, from: &BindingSource, semantics: &ProjectSemantics, file: Option<&SourceFileId>, diags: &mut Vec<RawDiagnostic>) -> TargetSem {
    let matches: Vec<&crate::project::ResourceDef> = semantics.resources.iter().filter(|r| r.name == attr && r.kind == "custom-attribute").collect();

    if matches.len() > 1 {
        diags.push(
            RawDiagnostic::new("aurelia/alias-conflict", format!("`{}` names more than one registered custom attribute", attr))
                .with_span(SourceSpan::new(binding_source_span(from), file.cloned())),
        );
        return TargetSem::Unknown;
    }

    if let Some(resource) = matches.first() {
        let bindable = resource.bindables.first();
        return TargetSem::AttributeBindable {
            resource: resource.name.clone(),
            bindable: bindable.map(|b| b.name.clone()).unwrap_or_else(|| "value".to_string()),
            ty: bindable.map(|b| b.ty.clone()).unwrap_or_else(|| "unknown".to_string()),
        };
    }

    diags.push(
        RawDiagnostic::new("aurelia/unknown-bindable", format!("no bindable resource found for `{}`", attr))
            .with_span(SourceSpan::new(binding_source_span(from), file.cloned())),
    );
    TargetSem::Unknown
}

/// A representative span for a binding source: the expression's own span
/// for a direct reference, or the union of every embedded expression's span
/// for an interpolation.
fn binding_source_span(source: &BindingSource) -> TextSpan {
    match source {
        BindingSource::ExprRef(r) => r.loc,
        BindingSource::Interp { exprs, .. } => exprs.iter().map(|e| e.loc).reduce(|a, b| a.union(&b)).unwrap_or_else(|| TextSpan::new(0, 0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{Bindable, ProjectSemantics, RegistrationGraph, ResourceDef, ResourceGraph};
    use crate::project::canonical::CanonicalSourceId;
    use crate::identity::NodeId;
    use crate::template::instruction::{BindingMode, ExprRef};
    use crate::identity::ExprId;
    use crate::span::TextSpan;

    fn semantics_with_greeter() -> ProjectSemantics {
        ProjectSemantics {
            resources: vec![ResourceDef {
                id: CanonicalSourceId::new("test", None, "/g.ts", "Greeter", "custom-element", "greeter", None, None),
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

    fn dummy_source() -> BindingSource {
        BindingSource::ExprRef(ExprRef { id: ExprId(1), loc: TextSpan::new(0, 1) })
    }

    #[test]
    fn resolves_known_element_bindable() {
        let semantics = semantics_with_greeter();
        let mut diags = Vec::new();
        let row = InstructionRow { target: NodeId::root(), instructions: vec![Instruction::PropertyBinding { to: "name".to_string(), from: dummy_source(), mode: BindingMode::ToView }] };
        let linked = resolve_row(&row, &semantics, Some("greeter"), None, None, &mut diags);
        assert!(matches!(linked.instructions[0].target, TargetSem::ElementBindable { .. }));
        assert!(diags.is_empty());
    }

    #[test]
    fn unknown_attribute_emits_diagnostic() {
        let semantics = semantics_with_greeter();
        let mut diags = Vec::new();
        let row = InstructionRow { target: NodeId::root(), instructions: vec![Instruction::AttributeBinding { attr: "does-not-exist".to_string(), to: "does-not-exist".to_string(), from: dummy_source() }] };
        let linked = resolve_row(&row, &semantics, None, None, Some(&SourceFileId::new("/t.html")), &mut diags);
        assert!(matches!(linked.instructions[0].target, TargetSem::Unknown));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, "aurelia/unknown-bindable");
        assert!(diags[0].span.is_some());
    }
}
