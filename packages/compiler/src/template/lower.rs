//! Template lowering (C4): HTML → DOM IR + instruction rows + expression
//! table, with stable node/expression ids and authored spans (§3, §4.2).
//!
//! Lowering does not know which tags are custom elements or which
//! attributes are custom-attribute resources; that is host resolution's
//! job (C5). What it produces here is the closed set of structural
//! instructions (bindings, listeners, template-controller splits, `<let>`)
//! that hold regardless of what the host project turns out to declare.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::diagnostics::RawDiagnostic;
use crate::expr;
use crate::identity::{ExprId, NodeId, SourceFileId, TemplateId};
use crate::span::{SourceSpan, TextSpan};
use crate::template::attr::{self, Command};
use crate::template::dom::{Branch, DomNode, Namespace, NodeAddress, Origin, RawAttr, TemplateIr};
use crate::template::html::{self, HtmlAttr, HtmlNode};
use crate::template::instruction::{
    BindingSource, ExprRef, ExpressionType, ExprTableEntry, ForOfDeclaration, HydrateProp, Instruction, InstructionRow,
};

#[derive(Debug, Clone, Default)]
pub struct LowerOptions {
    pub file: Option<SourceFileId>,
    pub name: Option<String>,
}

/// Metadata gathered from `<import>`/`<require>`/`<bindable>` elements and
/// from the root `<template>` tag's own attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleMeta {
    pub imports: Vec<String>,
    pub bindables: Vec<String>,
    pub aliases: Vec<String>,
    pub use_shadow_dom: bool,
    pub containerless: bool,
    pub capture: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrModule {
    pub name: Option<String>,
    pub root: TemplateId,
    pub templates: Vec<TemplateIr>,
    pub expr_table: Vec<ExprTableEntry>,
    pub meta: ModuleMeta,
    pub diags: Vec<RawDiagnostic>,
}

impl IrModule {
    pub fn template(&self, id: &TemplateId) -> Option<&TemplateIr> {
        self.templates.iter().find(|t| &t.id == id)
    }
}

struct Ctx {
    file: Option<SourceFileId>,
    templates: Vec<TemplateIr>,
    expr_table: Vec<ExprTableEntry>,
    diags: Vec<RawDiagnostic>,
    meta: ModuleMeta,
    controller_seq: u32,
}

pub fn lower_template(src: &str, options: LowerOptions) -> IrModule {
    let root_id = TemplateId::new("root");
    let mut ctx = Ctx {
        file: options.file.clone(),
        templates: Vec::new(),
        expr_table: Vec::new(),
        diags: Vec::new(),
        meta: ModuleMeta::default(),
        controller_seq: 0,
    };

    let parsed = html::parse_html(src);
    let (content_nodes, root_attrs) = extract_meta(&parsed, &mut ctx);

    let root_node_id = NodeId::root();
    let mut rows = Vec::new();
    let children = lower_children(&content_nodes, &root_node_id, &root_id, &mut rows, &mut ctx, src);

    let dom = DomNode::Template { id: root_node_id, attrs: root_attrs, content: children, loc: TextSpan::new(0, src.len() as u32) };
    let origin = Origin::Root { file: ctx.file.as_ref().map(|f| f.as_str().to_string()).unwrap_or_default() };
    ctx.templates.push(TemplateIr { id: root_id.clone(), dom, rows, origin });

    IrModule { name: options.name, root: root_id, templates: ctx.templates, expr_table: ctx.expr_table, meta: ctx.meta, diags: ctx.diags }
}

fn to_raw_attr(a: &HtmlAttr) -> RawAttr {
    RawAttr { name: a.name.clone(), value: a.value.clone(), name_span: a.name_span, value_span: a.value_span }
}

/// Peel off the document's ambient declarations: an outer `<template>`
/// wrapper (if the whole file is one), `<import>`/`<require>` elements, and
/// `<bindable>` elements. Everything else becomes the template's content.
fn extract_meta(nodes: &[HtmlNode], ctx: &mut Ctx) -> (Vec<HtmlNode>, Vec<RawAttr>) {
    let (root_attrs, candidates) = if nodes.len() == 1 {
        match &nodes[0] {
            HtmlNode::Element { tag, attrs, children, .. } if tag.eq_ignore_ascii_case("template") => {
                (attrs.iter().map(to_raw_attr).collect::<Vec<_>>(), children.clone())
            }
            _ => (Vec::new(), nodes.to_vec()),
        }
    } else {
        (Vec::new(), nodes.to_vec())
    };

    for attr in &root_attrs {
        match attr.name.as_str() {
            "use-shadow-dom" => ctx.meta.use_shadow_dom = true,
            "containerless" => ctx.meta.containerless = true,
            "capture" => ctx.meta.capture = true,
            "alias" => ctx.meta.aliases.extend(attr.value.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty())),
            _ => {}
        }
    }

    let mut content = Vec::new();
    for node in candidates {
        match &node {
            HtmlNode::Element { tag, attrs, .. } if tag.eq_ignore_ascii_case("import") || tag.eq_ignore_ascii_case("require") => {
                if let Some(from) = attrs.iter().find(|a| a.name.eq_ignore_ascii_case("from")) {
                    ctx.meta.imports.push(from.value.clone());
                }
            }
            HtmlNode::Element { tag, attrs, .. } if tag.eq_ignore_ascii_case("bindable") => {
                if let Some(name) = attrs.iter().find(|a| a.name.eq_ignore_ascii_case("name")) {
                    ctx.meta.bindables.push(name.value.clone());
                }
            }
            _ => content.push(node),
        }
    }

    (content, root_attrs)
}

fn lower_children(nodes: &[HtmlNode], parent: &NodeId, template_id: &TemplateId, rows: &mut Vec<InstructionRow>, ctx: &mut Ctx, src: &str) -> Vec<DomNode> {
    let mut out = Vec::new();
    let mut kind_counts: HashMap<&'static str, usize> = HashMap::new();

    for (idx, node) in nodes.iter().enumerate() {
        match node {
            HtmlNode::Text { text, loc } => {
                let count = kind_counts.entry("text").or_insert(0);
                let id = NodeId::child(parent, idx, "text", *count);
                *count += 1;
                if let Some(row) = lower_text(text, *loc, &id, ctx) {
                    rows.push(row);
                }
                out.push(DomNode::Text { id, text: text.clone(), loc: *loc });
            }
            HtmlNode::Comment { text, loc } => {
                let count = kind_counts.entry("comment").or_insert(0);
                let id = NodeId::child(parent, idx, "comment", *count);
                *count += 1;
                out.push(DomNode::Comment { id, text: text.clone(), loc: *loc });
            }
            HtmlNode::Element { tag, attrs, children, self_closed, loc, tag_loc, close_tag_loc } => {
                let count = kind_counts.entry("element").or_insert(0);
                let id = NodeId::child(parent, idx, "element", *count);
                *count += 1;

                if tag.eq_ignore_ascii_case("let") {
                    out.push(lower_let(attrs, &id, tag, *self_closed, *loc, *tag_loc, *close_tag_loc, rows, ctx));
                    continue;
                }

                if let Some(au_slot_attr) = find_au_slot_attr(attrs) {
                    lower_projection_child(tag, attrs, children, *self_closed, *loc, *tag_loc, *close_tag_loc, parent, template_id, ctx, src, &au_slot_attr);
                    continue;
                }

                if let Some((controller_attr, parsed)) = find_controller_attr(attrs) {
                    out.push(lower_controller_split(tag, attrs, children, *self_closed, *loc, *tag_loc, *close_tag_loc, parent, &id, idx, template_id, rows, ctx, src, &controller_attr, &parsed));
                    continue;
                }

                let mut instructions = Vec::new();
                for raw in attrs {
                    lower_attr(raw, ctx, &mut instructions);
                }
                if !instructions.is_empty() {
                    rows.push(InstructionRow { target: id.clone(), instructions });
                }

                let lowered_children = lower_children(children, &id, template_id, rows, ctx, src);
                out.push(DomNode::Element {
                    id,
                    ns: Namespace::Html,
                    tag: tag.clone(),
                    attrs: attrs.iter().map(to_raw_attr).collect(),
                    children: lowered_children,
                    self_closed: *self_closed,
                    loc: *loc,
                    tag_loc: *tag_loc,
                    close_tag_loc: *close_tag_loc,
                });
            }
        }
    }
    out
}

fn lower_let(
    attrs: &[HtmlAttr],
    id: &NodeId,
    tag: &str,
    self_closed: bool,
    loc: TextSpan,
    tag_loc: TextSpan,
    close_tag_loc: Option<TextSpan>,
    rows: &mut Vec<InstructionRow>,
    ctx: &mut Ctx,
) -> DomNode {
    let mut to_binding_context = false;
    let mut props = Vec::new();
    for raw in attrs {
        if raw.name.eq_ignore_ascii_case("to-binding-context") {
            to_binding_context = true;
            continue;
        }
        let parsed = attr::parse_attr_name(&raw.name);
        let source = BindingSource::ExprRef(parse_and_register(&raw.value, raw.value_span, ExpressionType::IsProperty, ctx));
        props.push(HydrateProp { to: parsed.target, from: source });
    }
    rows.push(InstructionRow { target: id.clone(), instructions: vec![Instruction::HydrateLetElement { instructions: props, to_binding_context }] });
    DomNode::Element {
        id: id.clone(),
        ns: Namespace::Html,
        tag: tag.to_string(),
        attrs: attrs.iter().map(to_raw_attr).collect(),
        children: Vec::new(),
        self_closed,
        loc,
        tag_loc,
        close_tag_loc,
    }
}

fn lower_attr(raw: &HtmlAttr, ctx: &mut Ctx, out: &mut Vec<Instruction>) {
    let parsed = attr::parse_attr_name(&raw.name);
    match parsed.command {
        Command::Bind(mode) => {
            let source = BindingSource::ExprRef(parse_and_register(&raw.value, raw.value_span, ExpressionType::IsProperty, ctx));
            out.push(Instruction::PropertyBinding { to: parsed.target, from: source, mode });
        }
        Command::Trigger | Command::Capture => {
            let source = BindingSource::ExprRef(parse_and_register(&raw.value, raw.value_span, ExpressionType::IsFunction, ctx));
            out.push(Instruction::ListenerBinding { to: parsed.target, from: source, capture: matches!(parsed.command, Command::Capture), modifier: parsed.modifier });
        }
        Command::Ref => {
            out.push(Instruction::RefBinding { to: parsed.target });
        }
        Command::Style => {
            let source = BindingSource::ExprRef(parse_and_register(&raw.value, raw.value_span, ExpressionType::IsProperty, ctx));
            out.push(Instruction::StylePropertyBinding { to: parsed.target, from: source });
        }
        Command::Class | Command::Attr => {
            let source = BindingSource::ExprRef(parse_and_register(&raw.value, raw.value_span, ExpressionType::IsProperty, ctx));
            out.push(Instruction::AttributeBinding { attr: parsed.target.clone(), to: parsed.target, from: source });
        }
        Command::For => {
            ctx.diags.push(
                RawDiagnostic::new("aurelia/invalid-command-usage", format!("`{}` is only valid as a template controller attribute", raw.name))
                    .with_span(SourceSpan::new(raw.name_span, ctx.file.clone())),
            );
        }
        Command::None => {
            if let Some((parts, exprs)) = split_interpolation(&raw.value) {
                let source = build_interp(parts, exprs, raw.value_span.start, ctx);
                out.push(Instruction::AttributeBinding { attr: parsed.target.clone(), to: parsed.target, from: source });
            } else {
                out.push(Instruction::SetAttribute { name: raw.name.clone(), value: raw.value.clone() });
            }
        }
    }
}

fn lower_text(text: &str, loc: TextSpan, target: &NodeId, ctx: &mut Ctx) -> Option<InstructionRow> {
    let (parts, exprs) = split_interpolation(text)?;
    let parts = parts.into_iter().map(|p| p.replace("\r\n", "\n")).collect();
    let source = build_interp(parts, exprs, loc.start, ctx);
    Some(InstructionRow { target: target.clone(), instructions: vec![Instruction::TextBinding { from: source }] })
}

/// Split `text` on `${...}` boundaries, tracking brace depth and quoting so
/// an expression that itself contains an object literal (`${f({a: 1})}`)
/// does not close early. Spans in the returned expression list are relative
/// to the start of `text`; callers rebase them with [`parse_and_register`].
fn split_interpolation(text: &str) -> Option<(Vec<String>, Vec<(String, TextSpan)>)> {
    if !text.contains("${") {
        return None;
    }
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut exprs = Vec::new();
    let mut literal_start = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{') {
            parts.push(text[literal_start..i].to_string());
            let expr_start = i + 2;
            let mut depth = 1i32;
            let mut j = expr_start;
            let mut quote: Option<u8> = None;
            while j < bytes.len() {
                let b = bytes[j];
                if let Some(q) = quote {
                    if b == q {
                        quote = None;
                    }
                } else {
                    match b {
                        b'"' | b'\'' | b'`' => quote = Some(b),
                        b'{' => depth += 1,
                        b'}' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                j += 1;
            }
            let expr_text = text[expr_start..j.min(bytes.len())].to_string();
            exprs.push((expr_text, TextSpan::new(expr_start as u32, j.min(bytes.len()) as u32)));
            i = (j + 1).min(bytes.len());
            literal_start = i;
        } else {
            i += 1;
        }
    }
    parts.push(text[literal_start..].to_string());
    Some((parts, exprs))
}

fn build_interp(parts: Vec<String>, exprs: Vec<(String, TextSpan)>, base_offset: u32, ctx: &mut Ctx) -> BindingSource {
    let mut expr_refs = Vec::new();
    for (text, local_span) in exprs {
        let abs_span = TextSpan::new(local_span.start + base_offset, local_span.end + base_offset);
        expr_refs.push(parse_and_register(&text, abs_span, ExpressionType::Interp, ctx));
    }
    BindingSource::Interp { parts, exprs: expr_refs }
}

fn parse_and_register(text: &str, span: TextSpan, expr_type: ExpressionType, ctx: &mut Ctx) -> ExprRef {
    let outcome = expr::parse(text);
    let ast = outcome.ast.offset(span.start as i64);
    if outcome.recovered {
        ctx.diags.push(
            RawDiagnostic::new("aurelia/expr-parse-error", format!("could not parse expression `{}`", text))
                .with_span(SourceSpan::new(span, ctx.file.clone()))
                .as_recovery(),
        );
    }
    let kind_label = match expr_type {
        ExpressionType::IsProperty => "IsProperty",
        ExpressionType::IsFunction => "IsFunction",
        ExpressionType::Interp => "Interp",
    };
    let id = ExprId::from_payload(ctx.file.as_ref(), span.start, span.end, kind_label, text);
    ctx.expr_table.push(ExprTableEntry { id, expression_type: expr_type, ast, span });
    ExprRef { id, loc: span }
}

fn find_au_slot_attr(attrs: &[HtmlAttr]) -> Option<HtmlAttr> {
    attrs.iter().find(|a| a.name.eq_ignore_ascii_case("au-slot")).cloned()
}

/// `au-slot` (§3 "Adopt projection children"): a child marked for projection
/// into a named slot is pulled out of its host's children entirely and
/// lowered into its own nested template, tagged `Origin::Projection` so
/// host resolution can route it to the right slot instead of rendering it
/// in place.
#[allow(clippy::too_many_arguments)]
fn lower_projection_child(
    tag: &str,
    attrs: &[HtmlAttr],
    children: &[HtmlNode],
    self_closed: bool,
    loc: TextSpan,
    tag_loc: TextSpan,
    close_tag_loc: Option<TextSpan>,
    host: &NodeId,
    template_id: &TemplateId,
    ctx: &mut Ctx,
    src: &str,
    au_slot_attr: &HtmlAttr,
) {
    let slot = non_empty(&au_slot_attr.value).unwrap_or_else(|| "default".to_string());

    ctx.controller_seq += 1;
    let def_id = TemplateId::synthetic(template_id, &format!("projection-{}", ctx.controller_seq));

    let remaining_attrs: Vec<HtmlAttr> = attrs.iter().filter(|a| a.name != au_slot_attr.name).cloned().collect();
    let stripped_node =
        HtmlNode::Element { tag: tag.to_string(), attrs: remaining_attrs, children: children.to_vec(), self_closed, loc, tag_loc, close_tag_loc };

    let inner_root = NodeId::root();
    let mut inner_rows = Vec::new();
    let inner_content = lower_children(std::slice::from_ref(&stripped_node), &inner_root, &def_id, &mut inner_rows, ctx, src);
    let inner_dom = DomNode::Template { id: inner_root, attrs: Vec::new(), content: inner_content, loc };

    let origin = Origin::Projection { host: NodeAddress { template: template_id.clone(), node: host.clone() }, slot };
    ctx.templates.push(TemplateIr { id: def_id, dom: inner_dom, rows: inner_rows, origin });
}

fn find_controller_attr(attrs: &[HtmlAttr]) -> Option<(HtmlAttr, attr::ParsedAttrName)> {
    for a in attrs {
        let parsed = attr::parse_attr_name(&a.name);
        if attr::is_template_controller_name(&parsed.target) {
            return Some((a.clone(), parsed));
        }
    }
    None
}

#[allow(clippy::too_many_arguments)]
fn lower_controller_split(
    tag: &str,
    attrs: &[HtmlAttr],
    children: &[HtmlNode],
    self_closed: bool,
    loc: TextSpan,
    tag_loc: TextSpan,
    close_tag_loc: Option<TextSpan>,
    _parent: &NodeId,
    anchor_id: &NodeId,
    _sibling_index: usize,
    template_id: &TemplateId,
    rows: &mut Vec<InstructionRow>,
    ctx: &mut Ctx,
    src: &str,
    controller_attr: &HtmlAttr,
    parsed: &attr::ParsedAttrName,
) -> DomNode {
    let (name, branch, for_of, branch_local) = classify_controller(parsed, controller_attr, ctx);

    ctx.controller_seq += 1;
    let def_id = TemplateId::synthetic(template_id, &format!("{}-{}", name, ctx.controller_seq));

    let remaining_attrs: Vec<HtmlAttr> = attrs.iter().filter(|a| a.name != controller_attr.name).cloned().collect();
    let stripped_node = HtmlNode::Element {
        tag: tag.to_string(),
        attrs: remaining_attrs,
        children: children.to_vec(),
        self_closed,
        loc,
        tag_loc,
        close_tag_loc,
    };

    let inner_root = NodeId::root();
    let mut inner_rows = Vec::new();
    let inner_content = lower_children(std::slice::from_ref(&stripped_node), &inner_root, &def_id, &mut inner_rows, ctx, src);
    let inner_dom = DomNode::Template { id: inner_root, attrs: Vec::new(), content: inner_content, loc };

    let origin = match branch {
        Some(b) => Origin::Branch { host: NodeAddress { template: template_id.clone(), node: anchor_id.clone() }, branch: b },
        None => Origin::Controller { host: NodeAddress { template: template_id.clone(), node: anchor_id.clone() }, controller: name.clone() },
    };
    ctx.templates.push(TemplateIr { id: def_id.clone(), dom: inner_dom, rows: inner_rows, origin });

    let props = if for_of.is_some() || controller_attr.value.trim().is_empty() {
        Vec::new()
    } else {
        let source = BindingSource::ExprRef(parse_and_register(&controller_attr.value, controller_attr.value_span, ExpressionType::IsProperty, ctx));
        vec![HydrateProp { to: "value".to_string(), from: source }]
    };

    rows.push(InstructionRow {
        target: anchor_id.clone(),
        instructions: vec![Instruction::HydrateTemplateController { res: name, props, def: def_id, branch, for_of, branch_local }],
    });

    DomNode::Comment { id: anchor_id.clone(), text: format!("au-controller:{}", parsed.target), loc }
}

fn classify_controller(parsed: &attr::ParsedAttrName, controller_attr: &HtmlAttr, ctx: &mut Ctx) -> (String, Option<Branch>, Option<ForOfDeclaration>, Option<String>) {
    match parsed.target.as_str() {
        "repeat" => {
            let (_local, for_of) = parse_for_of(&controller_attr.value, controller_attr.value_span, ctx);
            ("repeat".to_string(), None, for_of, None)
        }
        "if" => ("if".to_string(), None, None, None),
        "switch" => ("switch".to_string(), None, None, None),
        "with" => ("with".to_string(), None, None, None),
        "promise" => ("promise".to_string(), None, None, None),
        "portal" => ("portal".to_string(), None, None, None),
        "case" => ("case".to_string(), Some(Branch::Case), None, None),
        "default" => ("default".to_string(), Some(Branch::Default), None, None),
        "then" => ("then".to_string(), Some(Branch::Then), None, non_empty(&controller_attr.value)),
        "catch" => ("catch".to_string(), Some(Branch::Catch), None, non_empty(&controller_attr.value)),
        "pending" => ("pending".to_string(), Some(Branch::Pending), None, None),
        other => (other.to_string(), None, None, None),
    }
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

fn parse_for_of(text: &str, span: TextSpan, ctx: &mut Ctx) -> (Option<String>, Option<ForOfDeclaration>) {
    if let Some(of_pos) = text.find(" of ") {
        let local = text[..of_pos].trim().to_string();
        let rest = &text[of_pos + 4..];
        let ws_len = rest.len() - rest.trim_start().len();
        let iterable_text = rest.trim_start();
        let iterable_start = span.start + of_pos as u32 + 4 + ws_len as u32;
        let iterable_span = TextSpan::new(iterable_start, span.end);
        let iterable = parse_and_register(iterable_text, iterable_span, ExpressionType::IsProperty, ctx);
        (Some(local.clone()), Some(ForOfDeclaration { local, iterable }))
    } else {
        ctx.diags.push(
            RawDiagnostic::new("aurelia/invalid-binding-pattern", format!("`repeat.for` expects `<local> of <iterable>`, got `{}`", text))
                .with_span(SourceSpan::new(span, ctx.file.clone())),
        );
        (None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(src: &str) -> IrModule {
        lower_template(src, LowerOptions { file: Some(SourceFileId::new("/test.html")), name: None })
    }

    #[test]
    fn lowers_text_interpolation() {
        let module = lower("<div>${name}</div>");
        let root = module.template(&module.root).unwrap();
        assert!(!root.rows.is_empty() || root.dom.children().iter().any(|c| !c.children().is_empty()));
        assert_eq!(module.expr_table.len(), 1);
    }

    #[test]
    fn lowers_property_binding() {
        let module = lower(r#"<input value.bind="name">"#);
        let root = module.template(&module.root).unwrap();
        let row = root.rows.iter().find(|r| !r.instructions.is_empty()).expect("a row with instructions");
        assert!(matches!(row.instructions[0], Instruction::PropertyBinding { .. }));
    }

    #[test]
    fn repeat_for_splits_into_nested_template() {
        let module = lower(r#"<li repeat.for="item of items">${item.name}</li>"#);
        assert_eq!(module.templates.len(), 2);
        let root = module.template(&module.root).unwrap();
        let controller_row = root.rows.iter().find(|r| matches!(r.instructions.first(), Some(Instruction::HydrateTemplateController { .. }))).unwrap();
        match &controller_row.instructions[0] {
            Instruction::HydrateTemplateController { res, for_of, .. } => {
                assert_eq!(res, "repeat");
                let decl = for_of.as_ref().unwrap();
                assert_eq!(decl.local, "item");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn if_bind_splits_into_controller_template() {
        let module = lower(r#"<div if.bind="show">hi</div>"#);
        assert_eq!(module.templates.len(), 2);
        let root = module.template(&module.root).unwrap();
        let controller_row = root.rows.iter().find(|r| matches!(r.instructions.first(), Some(Instruction::HydrateTemplateController { .. }))).unwrap();
        match &controller_row.instructions[0] {
            Instruction::HydrateTemplateController { res, props, branch, .. } => {
                assert_eq!(res, "if");
                assert!(branch.is_none());
                assert_eq!(props.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn let_element_produces_hydrate_let() {
        let module = lower(r#"<let full-name.bind="first + ' ' + last"></let>"#);
        let root = module.template(&module.root).unwrap();
        let row = root.rows.iter().find(|r| matches!(r.instructions.first(), Some(Instruction::HydrateLetElement { .. }))).unwrap();
        match &row.instructions[0] {
            Instruction::HydrateLetElement { instructions, to_binding_context } => {
                assert_eq!(instructions.len(), 1);
                assert!(!to_binding_context);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn au_slot_child_extracts_into_projection_template() {
        let module = lower(r#"<my-element><div au-slot="header">${title}</div></my-element>"#);
        assert_eq!(module.templates.len(), 2);

        let root = module.template(&module.root).unwrap();
        let host = root.dom.children().iter().find(|c| matches!(c, DomNode::Element { tag, .. } if tag == "my-element")).expect("the host element");
        assert!(host.children().is_empty(), "the au-slot child must be removed from the host's children");

        let projected = module.templates.iter().find(|t| t.id != module.root).expect("a nested projection template");
        match &projected.origin {
            Origin::Projection { slot, .. } => assert_eq!(slot, "header"),
            other => panic!("expected Origin::Projection, got {:?}", other),
        }
        assert!(projected.dom.children().iter().any(|c| matches!(c, DomNode::Element { tag, .. } if tag == "div")));
    }

    #[test]
    fn plain_attribute_interpolation_lowers_to_attribute_binding() {
        let module = lower(r#"<div class="item ${kind}"></div>"#);
        let root = module.template(&module.root).unwrap();
        let row = root.rows.iter().find(|r| !r.instructions.is_empty()).unwrap();
        assert!(matches!(row.instructions[0], Instruction::AttributeBinding { .. }));
    }
}
