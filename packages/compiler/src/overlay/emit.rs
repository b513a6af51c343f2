//! Overlay emission (§4.7 "Emit"): render each frame's lambdas into source
//! text, tracking the generated offsets needed by [`super::mapping`].

use serde::{Deserialize, Serialize};

use crate::expr::ast::{BinaryOp, Expr, Primitive, UnaryOp};
use crate::identity::ExprId;
use crate::span::TextSpan;
use crate::template::lower::IrModule;

use super::plan::{find_entry, OverlayPlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmitMode {
    /// `type Frame0 = App; __au$access<Frame0>(o => o.name);`
    HostTyped,
    /// `__au$access(/** @param {App} o */ (o) => o.name);`
    Dynamic,
}

/// A single scope/member-access chain rewritten into the overlay text,
/// recorded so [`super::mapping`] can pair it with its authored HTML span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSpan {
    pub html_span: TextSpan,
    pub overlay_span: TextSpan,
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayOffset {
    pub expr_id: ExprId,
    pub lambda_span: TextSpan,
    pub call_span: TextSpan,
    pub member_spans: Vec<MemberSpan>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverlaySource {
    pub text: String,
    pub offsets: Vec<OverlayOffset>,
}

/// Emit every frame in `plan` into one overlay document.
pub fn emit(module: &IrModule, plan: &OverlayPlan, mode: EmitMode, banner: &str) -> OverlaySource {
    let mut text = String::new();
    text.push_str(banner);
    let mut offsets = Vec::new();

    for frame in &plan.frames {
        if mode == EmitMode::HostTyped {
            text.push_str(&format!("type {} = {};\n", frame.type_name, frame.type_expr));
        }
        for lambda in &frame.lambdas {
            let entry = match find_entry(module, lambda.expr_id) {
                Some(e) => e,
                None => continue,
            };
            let mut members = Vec::new();
            let call_start = text.len() as u32;
            let lambda_start;
            match mode {
                EmitMode::HostTyped => {
                    text.push_str(&format!("__au$access<{}>(", frame.type_name));
                    lambda_start = text.len() as u32;
                    text.push_str("o => ");
                    let body_start = text.len() as u32;
                    let (body_text, body_members) = render_with_members(&entry.ast, body_start, entry.span);
                    text.push_str(&body_text);
                    members.extend(body_members);
                }
                EmitMode::Dynamic => {
                    text.push_str(&format!("__au$access(/** @param {{{}}} o */ ", frame.type_expr));
                    lambda_start = text.len() as u32;
                    text.push_str("(o) => ");
                    let body_start = text.len() as u32;
                    let (body_text, body_members) = render_with_members(&entry.ast, body_start, entry.span);
                    text.push_str(&body_text);
                    members.extend(body_members);
                }
            }
            text.push_str(");\n");
            let lambda_end = text.len() as u32 - 3; // before ");\n"
            let call_end = text.len() as u32;
            offsets.push(OverlayOffset {
                expr_id: lambda.expr_id,
                lambda_span: TextSpan::new(lambda_start, lambda_end),
                call_span: TextSpan::new(call_start, call_end),
                member_spans: members,
            });
        }
    }

    OverlaySource { text, offsets }
}

/// Render `expr` starting at absolute text offset `base`, returning the
/// rendered substring plus one [`MemberSpan`] per scope/member-access node
/// whose generated fragment can be paired back to `expr_html_span`'s
/// authored text. `AccessKeyed` with a computed key degrades (no exact
/// member-name text to align with).
fn render_with_members(expr: &Expr, base: u32, _expr_html_span: TextSpan) -> (String, Vec<MemberSpan>) {
    match expr {
        Expr::AccessThis { ancestors, span } => {
            let text = format!("o{}", ".$parent".repeat(*ancestors as usize));
            let ms = MemberSpan { html_span: *span, overlay_span: TextSpan::new(base, base + text.len() as u32), degraded: false };
            (text, vec![ms])
        }
        Expr::AccessScope { name, ancestors, span } => {
            let text = format!("o{}.{}", ".$parent".repeat(*ancestors as usize), name);
            let ms = MemberSpan { html_span: *span, overlay_span: TextSpan::new(base, base + text.len() as u32), degraded: false };
            (text, vec![ms])
        }
        Expr::AccessMember { object, name, optional, span } => {
            let (obj_text, mut spans) = render_with_members(object, base, object.span());
            let op = if *optional { "?." } else { "." };
            let text = format!("{}{}{}", obj_text, op, name);
            spans.push(MemberSpan { html_span: *span, overlay_span: TextSpan::new(base, base + text.len() as u32), degraded: false });
            (text, spans)
        }
        Expr::AccessKeyed { object, key, optional, span } => {
            let (obj_text, mut spans) = render_with_members(object, base, object.span());
            let (key_text, key_spans) = render_with_members(key, base + obj_text.len() as u32 + 1, key.span());
            let op = if *optional { "?.[" } else { "[" };
            let text = format!("{}{}{}]", obj_text, op, key_text);
            spans.extend(key_spans);
            let computed = !matches!(key.as_ref(), Expr::PrimitiveLiteral { value: Primitive::String(_), .. });
            spans.push(MemberSpan { html_span: *span, overlay_span: TextSpan::new(base, base + text.len() as u32), degraded: computed });
            (text, spans)
        }
        Expr::CallScope { name, ancestors, args, .. } => {
            let callee = format!("o{}.{}", ".$parent".repeat(*ancestors as usize), name);
            render_call(callee, args, base)
        }
        Expr::CallMember { object, name, args, optional, .. } => {
            let (obj_text, spans) = render_with_members(object, base, object.span());
            let op = if *optional { "?." } else { "." };
            let callee = format!("{}{}{}", obj_text, op, name);
            let (call_text, mut call_spans) = render_call(callee, args, base);
            call_spans.splice(0..0, spans);
            (call_text, call_spans)
        }
        Expr::CallFunction { callee, args, .. } => {
            let (callee_text, spans) = render_with_members(callee, base, callee.span());
            let wrapped = format!("({})", callee_text);
            let (call_text, mut call_spans) = render_call(wrapped, args, base);
            call_spans.splice(0..0, spans);
            (call_text, call_spans)
        }
        Expr::Binary { op, left, right, .. } => {
            let (l, mut spans) = render_with_members(left, base + 1, left.span());
            let op_str = binary_op_str(*op);
            let (r, rspans) = render_with_members(right, base + 1 + l.len() as u32 + op_str.len() as u32 + 2, right.span());
            spans.extend(rspans);
            (format!("({} {} {})", l, op_str, r), spans)
        }
        Expr::Unary { op, operand, .. } => {
            let prefix = unary_op_str(*op);
            let (o, spans) = render_with_members(operand, base + prefix.len() as u32, operand.span());
            (format!("{}{}", prefix, o), spans)
        }
        Expr::Assign { target, value, .. } => {
            let (t, mut spans) = render_with_members(target, base, target.span());
            let (v, vspans) = render_with_members(value, base + t.len() as u32 + 3, value.span());
            spans.extend(vspans);
            (format!("{} = {}", t, v), spans)
        }
        Expr::Conditional { test, consequent, alternate, .. } => {
            let (t, mut spans) = render_with_members(test, base + 1, test.span());
            let off1 = base + 1 + t.len() as u32 + 3;
            let (c, cs) = render_with_members(consequent, off1, consequent.span());
            let off2 = off1 + c.len() as u32 + 3;
            let (a, aspans) = render_with_members(alternate, off2, alternate.span());
            spans.extend(cs);
            spans.extend(aspans);
            (format!("({} ? {} : {})", t, c, a), spans)
        }
        Expr::ArrayLiteral { elements, .. } => {
            let mut parts = Vec::new();
            let mut spans = Vec::new();
            let mut cursor = base + 1;
            for (i, e) in elements.iter().enumerate() {
                let (text, s) = render_with_members(e, cursor, e.span());
                cursor += text.len() as u32 + if i + 1 < elements.len() { 2 } else { 0 };
                parts.push(text);
                spans.extend(s);
            }
            (format!("[{}]", parts.join(", ")), spans)
        }
        Expr::ObjectLiteral { properties, .. } => {
            let mut parts = Vec::new();
            let mut spans = Vec::new();
            for p in properties {
                let (value_text, s) = render_with_members(&p.value, base, p.value.span());
                spans.extend(s);
                if p.computed {
                    parts.push(format!("[{}]: {}", p.key, value_text));
                } else {
                    parts.push(format!("{}: {}", p.key, value_text));
                }
            }
            (format!("{{ {} }}", parts.join(", ")), spans)
        }
        Expr::Template { parts, exprs, .. } => {
            let mut out = String::from("`");
            let mut spans = Vec::new();
            for (i, part) in parts.iter().enumerate() {
                out.push_str(part);
                if let Some(e) = exprs.get(i) {
                    out.push_str("${");
                    let (t, s) = render_with_members(e, base + out.len() as u32, e.span());
                    out.push_str(&t);
                    out.push('}');
                    spans.extend(s);
                }
            }
            out.push('`');
            (out, spans)
        }
        Expr::TaggedTemplate { tag, parts, exprs, .. } => {
            let (tag_text, mut spans) = render_with_members(tag, base, tag.span());
            let (template_text, tspans) = render_with_members(
                &Expr::Template { parts: parts.clone(), exprs: exprs.clone(), span: expr.span() },
                base + tag_text.len() as u32,
                expr.span(),
            );
            spans.extend(tspans);
            (format!("{}{}", tag_text, template_text), spans)
        }
        Expr::PrimitiveLiteral { value, .. } => (primitive_literal_str(value), Vec::new()),
        Expr::BindingBehavior { expr, .. } | Expr::ValueConverter { expr, .. } => render_with_members(expr, base, expr.span()),
        Expr::UnknownStatement { .. } => ("undefined".to_string(), Vec::new()),
    }
}

fn render_call(callee: String, args: &[Expr], base: u32) -> (String, Vec<MemberSpan>) {
    let mut spans = Vec::new();
    let mut parts = Vec::new();
    let mut cursor = base + callee.len() as u32 + 1;
    for (i, a) in args.iter().enumerate() {
        let (text, s) = render_with_members(a, cursor, a.span());
        cursor += text.len() as u32 + if i + 1 < args.len() { 2 } else { 0 };
        parts.push(text);
        spans.extend(s);
    }
    (format!("{}({})", callee, parts.join(", ")), spans)
}

fn binary_op_str(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        BinaryOp::Eq => "==",
        BinaryOp::Neq => "!=",
        BinaryOp::StrictEq => "===",
        BinaryOp::StrictNeq => "!==",
        BinaryOp::Lt => "<",
        BinaryOp::Gt => ">",
        BinaryOp::Le => "<=",
        BinaryOp::Ge => ">=",
        BinaryOp::And => "&&",
        BinaryOp::Or => "||",
        BinaryOp::In => "in",
        BinaryOp::Instanceof => "instanceof",
    }
}

fn unary_op_str(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Not => "!",
        UnaryOp::Neg => "-",
        UnaryOp::Plus => "+",
        UnaryOp::TypeOf => "typeof ",
        UnaryOp::Void => "void ",
    }
}

fn primitive_literal_str(value: &Primitive) -> String {
    match value {
        Primitive::Null => "null".to_string(),
        Primitive::Undefined => "undefined".to_string(),
        Primitive::Bool(b) => b.to_string(),
        Primitive::Number(n) => n.to_string(),
        Primitive::String(s) => format!("{:?}", s),
    }
}
