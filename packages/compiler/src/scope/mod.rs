//! Scope Binder (C6): lexical frames for root/controllers/branches/`<let>`,
//! and the map from every expression to the innermost frame visible at its
//! DOM site (§4.5).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::identity::{ExprId, FrameId, TemplateId};
use crate::template::dom::{Branch, DomNode};
use crate::template::instruction::{BindingSource, ExprRef, ForOfDeclaration, Instruction, InstructionRow};
use crate::template::lower::IrModule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameOrigin {
    Root,
    Controller,
    Branch,
    Let,
}

/// One lexical frame. `locals` maps a declared identifier to its (best
/// effort) type; `"unknown"` when no type could be derived without a full
/// type engine. `replaces_scope` marks `with` frames, consulted by the type
/// checker so member lookups skip straight to `locals["$with"]` instead of
/// also checking the parent chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub id: FrameId,
    pub parent: Option<FrameId>,
    pub origin: FrameOrigin,
    pub locals: HashMap<String, String>,
    pub replaces_scope: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopeBindResult {
    pub frames: Vec<Frame>,
    pub expr_frame: HashMap<ExprId, FrameId>,
}

impl ScopeBindResult {
    pub fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(id.0 as usize)
    }

    /// Walk `frame.parent` `n` times; each hop counts regardless of whether
    /// the frame it lands on `replaces_scope`.
    pub fn ancestor(&self, start: FrameId, n: u32) -> Option<FrameId> {
        let mut current = start;
        for _ in 0..n {
            current = self.frame(current)?.parent?;
        }
        Some(current)
    }
}

struct Binder {
    frames: Vec<Frame>,
    expr_frame: HashMap<ExprId, FrameId>,
}

impl Binder {
    fn push_frame(&mut self, parent: Option<FrameId>, origin: FrameOrigin, locals: HashMap<String, String>, replaces_scope: bool) -> FrameId {
        let id = FrameId(self.frames.len() as u32);
        self.frames.push(Frame { id, parent, origin, locals, replaces_scope });
        id
    }

    fn assign_source(&mut self, source: &BindingSource, frame: FrameId) {
        match source {
            BindingSource::ExprRef(r) => self.assign_expr(r, frame),
            BindingSource::Interp { exprs, .. } => {
                for r in exprs {
                    self.assign_expr(r, frame);
                }
            }
        }
    }

    fn assign_expr(&mut self, r: &ExprRef, frame: FrameId) {
        self.expr_frame.insert(r.id, frame);
    }
}

/// Bind every template in `module`, starting from `root_vm_type` (the VM
/// reflection token's root type literal, or `"unknown"` when the caller has
/// none to offer).
pub fn bind(module: &IrModule, root_vm_type: &str) -> ScopeBindResult {
    let mut locals = HashMap::new();
    locals.insert("$this".to_string(), root_vm_type.to_string());
    let mut binder = Binder { frames: vec![Frame { id: FrameId::ROOT, parent: None, origin: FrameOrigin::Root, locals, replaces_scope: false }], expr_frame: HashMap::new() };
    bind_template(module, &module.root, FrameId::ROOT, &mut binder);
    ScopeBindResult { frames: binder.frames, expr_frame: binder.expr_frame }
}

fn bind_template(module: &IrModule, template_id: &TemplateId, entry_frame: FrameId, binder: &mut Binder) {
    let template = match module.template(template_id) {
        Some(t) => t,
        None => return,
    };
    let rows_by_node: HashMap<_, _> = template.rows.iter().map(|r| (r.target.clone(), r)).collect();
    bind_siblings(module, &rows_by_node, template.dom.children(), entry_frame, binder);
}

fn bind_siblings(module: &IrModule, rows_by_node: &HashMap<crate::identity::NodeId, &InstructionRow>, nodes: &[DomNode], mut current: FrameId, binder: &mut Binder) {
    for node in nodes {
        if let Some(row) = rows_by_node.get(node.id()) {
            current = bind_row(module, row, current, binder);
        }
        bind_siblings(module, rows_by_node, node.children(), current, binder);
    }
}

/// Bind the instructions on one row, returning the frame in effect for the
/// *next* sibling (changed only by a `to-binding-context` `<let>`).
fn bind_row(module: &IrModule, row: &InstructionRow, current: FrameId, binder: &mut Binder) -> FrameId {
    let mut next = current;
    for instr in &row.instructions {
        match instr {
            Instruction::PropertyBinding { from, .. }
            | Instruction::AttributeBinding { from, .. }
            | Instruction::StylePropertyBinding { from, .. }
            | Instruction::ListenerBinding { from, .. }
            | Instruction::TextBinding { from } => binder.assign_source(from, current),
            Instruction::RefBinding { .. } | Instruction::SetAttribute { .. } | Instruction::SetClassAttribute { .. } | Instruction::SetStyleAttribute { .. } | Instruction::SetProperty { .. } => {}
            Instruction::HydrateLetElement { instructions, to_binding_context } => {
                for prop in instructions {
                    binder.assign_source(&prop.from, current);
                }
                if *to_binding_context {
                    let locals = instructions.iter().map(|p| (p.to.clone(), "unknown".to_string())).collect();
                    next = binder.push_frame(Some(current), FrameOrigin::Let, locals, false);
                } else {
                    let frame = &mut binder.frames[current.0 as usize];
                    for prop in instructions {
                        frame.locals.insert(prop.to.clone(), "unknown".to_string());
                    }
                }
            }
            Instruction::HydrateTemplateController { res, props, def, branch, for_of, branch_local } => {
                for prop in props {
                    binder.assign_source(&prop.from, current);
                }
                if let Some(fo) = for_of {
                    binder.assign_expr(&fo.iterable, current);
                }
                let child_frame = controller_child_frame(res, for_of.as_ref(), *branch, branch_local.as_deref(), current, binder);
                bind_template(module, def, child_frame, binder);
            }
        }
    }
    next
}

/// Decide the frame the controller's content is bound under. Controllers
/// that don't introduce locals (`if`, `switch`, `case`, `default`, `portal`)
/// reuse the parent frame rather than allocating an empty one.
fn controller_child_frame(res: &str, for_of: Option<&ForOfDeclaration>, branch: Option<Branch>, branch_local: Option<&str>, parent: FrameId, binder: &mut Binder) -> FrameId {
    match res {
        "repeat" => {
            let mut locals = HashMap::new();
            if let Some(fo) = for_of {
                for name in destructure_locals(&fo.local) {
                    locals.insert(name, "unknown".to_string());
                }
            }
            locals.insert("$index".to_string(), "number".to_string());
            binder.push_frame(Some(parent), FrameOrigin::Controller, locals, false)
        }
        "with" => {
            let mut locals = HashMap::new();
            locals.insert("$with".to_string(), "unknown".to_string());
            binder.push_frame(Some(parent), FrameOrigin::Controller, locals, true)
        }
        "then" | "catch" if branch.is_some() => {
            let mut locals = HashMap::new();
            if let Some(name) = branch_local {
                locals.insert(name.to_string(), "unknown".to_string());
            }
            binder.push_frame(Some(parent), FrameOrigin::Branch, locals, false)
        }
        "pending" => binder.push_frame(Some(parent), FrameOrigin::Branch, HashMap::new(), false),
        _ => parent,
    }
}

/// `repeat.for`'s declared binding identifier(s). A plain identifier binds
/// itself; array/object destructuring binds one canonical local per
/// top-level identifier (renamed object bindings use the rename target);
/// a nested pattern inside a destructured slot can't be resolved to a name
/// and binds `"unknown"`.
fn destructure_locals(raw: &str) -> Vec<String> {
    let t = raw.trim();
    if (t.starts_with('[') && t.ends_with(']')) || (t.starts_with('{') && t.ends_with('}')) {
        let inner = &t[1..t.len() - 1];
        split_top_level_commas(inner)
            .into_iter()
            .filter_map(|part| {
                let part = part.trim();
                if part.is_empty() {
                    return None;
                }
                let name_part = match part.find(':') {
                    Some(idx) => part[idx + 1..].trim(),
                    None => part,
                };
                let name_part = name_part.trim_start_matches("...").trim();
                if name_part.starts_with('[') || name_part.starts_with('{') {
                    Some("unknown".to_string())
                } else {
                    Some(name_part.to_string())
                }
            })
            .collect()
    } else if !t.is_empty() {
        vec![t.to_string()]
    } else {
        Vec::new()
    }
}

fn split_top_level_commas(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '[' | '{' => depth += 1,
            ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                out.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    out.push(&s[start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SourceFileId;
    use crate::template::lower::{lower_template, LowerOptions};

    fn lower(src: &str) -> IrModule {
        lower_template(src, LowerOptions { file: Some(SourceFileId::new("/t.html")), name: None })
    }

    #[test]
    fn repeat_binds_item_and_index() {
        let module = lower(r#"<li repeat.for="item of items">${item.name}</li>"#);
        let result = bind(&module, "App");
        let repeat_frame = result.frames.iter().find(|f| f.locals.contains_key("item")).expect("repeat frame");
        assert_eq!(repeat_frame.locals.get("item"), Some(&"unknown".to_string()));
        assert_eq!(repeat_frame.locals.get("$index"), Some(&"number".to_string()));
    }

    #[test]
    fn destructured_repeat_binds_each_top_level_identifier() {
        let locals = destructure_locals("[k, v]");
        assert_eq!(locals, vec!["k".to_string(), "v".to_string()]);
    }

    #[test]
    fn nested_destructuring_falls_back_to_unknown() {
        let locals = destructure_locals("[[a, b], c]");
        assert_eq!(locals, vec!["unknown".to_string(), "c".to_string()]);
    }

    #[test]
    fn with_replaces_scope() {
        let module = lower(r#"<div with.bind="address"><span>${street}</span></div>"#);
        let result = bind(&module, "App");
        let with_frame = result.frames.iter().find(|f| f.replaces_scope).expect("with frame");
        assert!(with_frame.locals.contains_key("$with"));
    }

    #[test]
    fn let_without_to_binding_context_is_visible_to_later_siblings() {
        let module = lower(r#"<let full-name.bind="first"></let><span>${fullName}</span>"#);
        let result = bind(&module, "App");
        let root = result.frame(FrameId::ROOT).unwrap();
        assert!(root.locals.contains_key("full-name"));
    }

    #[test]
    fn let_to_binding_context_creates_overlay_frame() {
        let module = lower(r#"<let to-binding-context full-name.bind="first"></let>"#);
        let result = bind(&module, "App");
        assert!(result.frames.iter().any(|f| f.origin == FrameOrigin::Let));
    }

    #[test]
    fn ancestor_walks_parent_chain() {
        // `if` is a passthrough controller (introduces no frame), so the
        // nested `repeat` frame's direct parent is the root frame.
        let module = lower(r#"<div if.bind="show"><div repeat.for="item of items">${item}</div></div>"#);
        let result = bind(&module, "App");
        let innermost = result.frames.last().unwrap().id;
        let parent = result.ancestor(innermost, 1);
        assert_eq!(parent, Some(FrameId::ROOT));
    }
}
