//! Type Check (C7): expected-vs-inferred comparison per `LinkedInstruction`
//! (§4.6).

use std::collections::HashMap;

use crate::diagnostics::RawDiagnostic;
use crate::expr::ast::{BinaryOp, Expr, Primitive, UnaryOp};
use crate::identity::{ExprId, FrameId, SourceFileId};
use crate::resolve::LinkedRow;
use crate::scope::ScopeBindResult;
use crate::span::SourceSpan;
use crate::template::instruction::{BindingSource, ExprTableEntry};
use crate::template::lower::IrModule;

fn is_unknown_like(ty: &str) -> bool {
    ty == "unknown" || ty == "any"
}

/// Walk every `LinkedInstruction`'s binding source, infer its expression's
/// type in the frame the scope binder assigned it, and compare against the
/// target's expected type.
pub fn check(module: &IrModule, linked_rows: &[LinkedRow], scope: &ScopeBindResult, file: Option<&SourceFileId>) -> Vec<RawDiagnostic> {
    let expr_by_id: HashMap<ExprId, &ExprTableEntry> = module.expr_table.iter().map(|e| (e.id, e)).collect();
    let mut diags = Vec::new();
    for row in linked_rows {
        for linked in &row.instructions {
            let expected = linked.target.expected_type();
            if is_unknown_like(expected) {
                continue;
            }
            if let Some(BindingSource::ExprRef(r)) = &linked.from {
                check_one(r.id, expected, &expr_by_id, scope, file, &mut diags);
            }
            // Interpolation segments are checked against the interpolation's
            // own implicit `string` coercion elsewhere, not the instruction's
            // target type, since any segment type stringifies.
        }
    }
    diags
}

fn check_one(id: ExprId, expected: &str, expr_by_id: &HashMap<ExprId, &ExprTableEntry>, scope: &ScopeBindResult, file: Option<&SourceFileId>, diags: &mut Vec<RawDiagnostic>) {
    let entry = match expr_by_id.get(&id) {
        Some(e) => *e,
        None => return,
    };
    let frame = scope.expr_frame.get(&id).copied().unwrap_or(FrameId::ROOT);
    let inferred = infer_type(&entry.ast, frame, scope);
    if is_unknown_like(&inferred) {
        return;
    }
    if expected != inferred {
        let mut diag = RawDiagnostic::new("aurelia/expr-type-mismatch", format!("expected `{}`, found `{}`", expected, inferred))
            .with_span(SourceSpan::new(entry.span, file.cloned()));
        diag.data = serde_json::json!({ "expected": expected, "inferred": inferred });
        diags.push(diag);
    }
}

fn infer_type(expr: &Expr, frame: FrameId, scope: &ScopeBindResult) -> String {
    match expr {
        Expr::AccessThis { ancestors, .. } => resolve_name_type("$this", frame, *ancestors, scope),
        Expr::AccessScope { name, ancestors, .. } => resolve_name_type(name, frame, *ancestors, scope),
        Expr::AccessMember { .. } | Expr::AccessKeyed { .. } => "unknown".to_string(),
        Expr::CallScope { .. } | Expr::CallMember { .. } | Expr::CallFunction { .. } => "unknown".to_string(),
        Expr::Binary { op, .. } => binary_type(*op),
        Expr::Unary { op, .. } => unary_type(*op),
        Expr::Assign { value, .. } => infer_type(value, frame, scope),
        Expr::Conditional { consequent, alternate, .. } => {
            let c = infer_type(consequent, frame, scope);
            let a = infer_type(alternate, frame, scope);
            if c == a {
                c
            } else {
                "unknown".to_string()
            }
        }
        Expr::ArrayLiteral { .. } => "unknown[]".to_string(),
        Expr::ObjectLiteral { .. } => "object".to_string(),
        Expr::Template { .. } | Expr::TaggedTemplate { .. } => "string".to_string(),
        Expr::PrimitiveLiteral { value, .. } => primitive_type(value).to_string(),
        Expr::BindingBehavior { expr, .. } | Expr::ValueConverter { expr, .. } => infer_type(expr, frame, scope),
        Expr::UnknownStatement { .. } => "unknown".to_string(),
    }
}

/// Look up `name` starting `ancestors` frames up from `frame`, then climbing
/// the parent chain. A `with` frame (`replaces_scope`) that doesn't itself
/// bind `name` stops the climb; member lookup inside `with` targets the
/// replaced context, not the outer scope, and without real member types that
/// is as far as inference can go.
fn resolve_name_type(name: &str, frame: FrameId, ancestors: u32, scope: &ScopeBindResult) -> String {
    let mut current = frame;
    for _ in 0..ancestors {
        match scope.frame(current).and_then(|f| f.parent) {
            Some(p) => current = p,
            None => return "unknown".to_string(),
        }
    }
    loop {
        let f = match scope.frame(current) {
            Some(f) => f,
            None => return "unknown".to_string(),
        };
        if let Some(ty) = f.locals.get(name) {
            return ty.clone();
        }
        if f.replaces_scope {
            return "unknown".to_string();
        }
        match f.parent {
            Some(p) => current = p,
            None => return "unknown".to_string(),
        }
    }
}

fn binary_type(op: BinaryOp) -> String {
    match op {
        BinaryOp::Eq | BinaryOp::Neq | BinaryOp::StrictEq | BinaryOp::StrictNeq | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge | BinaryOp::And | BinaryOp::Or | BinaryOp::In | BinaryOp::Instanceof => {
            "boolean".to_string()
        }
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => "number".to_string(),
        // `+` is ambiguous between numeric and string concatenation without
        // operand types in hand.
        BinaryOp::Add => "unknown".to_string(),
    }
}

fn unary_type(op: UnaryOp) -> String {
    match op {
        UnaryOp::Not => "boolean".to_string(),
        UnaryOp::TypeOf => "string".to_string(),
        UnaryOp::Neg | UnaryOp::Plus => "number".to_string(),
        UnaryOp::Void => "undefined".to_string(),
    }
}

fn primitive_type(value: &Primitive) -> &'static str {
    match value {
        Primitive::Null => "null",
        Primitive::Undefined => "undefined",
        Primitive::Bool(_) => "boolean",
        Primitive::Number(_) => "number",
        Primitive::String(_) => "string",
    }
}
