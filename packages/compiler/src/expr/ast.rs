//! The closed expression AST sum.
//!
//! Every variant here is one of the node kinds named in the binding
//! language's design notes. Adding a variant means updating every `match`
//! that consumes this type, intentionally: there is no catch-all arm
//! anywhere in this crate that silently accepts an unhandled kind.

use serde::{Deserialize, Serialize};

use crate::span::TextSpan;

/// Binary operators recognized by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    StrictEq,
    StrictNeq,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    In,
    Instanceof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    TypeOf,
    Void,
}

/// A literal value produced by the primitive-literal grammar (`true`,
/// `false`, `null`, `undefined`, numbers, strings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Primitive {
    Null,
    Undefined,
    Bool(bool),
    Number(f64),
    String(String),
}

/// One key/value pair of an object literal. `computed` marks `[expr]: v`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectProperty {
    pub key: String,
    pub value: Expr,
    pub computed: bool,
}

/// A binding-behavior or value-converter argument list node shares this
/// shape: a name plus positional argument expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedArgs {
    pub name: String,
    pub args: Vec<Expr>,
}

/// The closed expression AST sum named in the design notes.
///
/// `AccessScope`/`AccessThis`/`AccessMember`/`AccessKeyed` read; `Assign`
/// writes (`to-view`/`two-way` bindings on an access chain); the `Call*`
/// variants invoke; the rest are standard expression-grammar nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Expr {
    /// Read of an identifier resolved against the current scope, with an
    /// optional `$parent` ancestor hop count (`$parent.foo` => ancestors=1).
    AccessScope { name: String, ancestors: u32, span: TextSpan },
    /// `$this` by itself, or `$this` with ancestor hops.
    AccessThis { ancestors: u32, span: TextSpan },
    /// `obj.member`, optionally safe-navigated (`obj?.member`).
    AccessMember { object: Box<Expr>, name: String, optional: bool, span: TextSpan },
    /// `obj[key]`, optionally safe-navigated.
    AccessKeyed { object: Box<Expr>, key: Box<Expr>, optional: bool, span: TextSpan },
    /// `name(args)` where `name` resolves against scope.
    CallScope { name: String, ancestors: u32, args: Vec<Expr>, span: TextSpan },
    /// `obj.method(args)`.
    CallMember { object: Box<Expr>, name: String, args: Vec<Expr>, optional: bool, span: TextSpan },
    /// `(expr)(args)`, calling the result of an arbitrary expression.
    CallFunction { callee: Box<Expr>, args: Vec<Expr>, span: TextSpan },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr>, span: TextSpan },
    Unary { op: UnaryOp, operand: Box<Expr>, span: TextSpan },
    /// `lhs = rhs`, the only mutating node; only legal as the root of a
    /// `two-way`/`from-view` binding source.
    Assign { target: Box<Expr>, value: Box<Expr>, span: TextSpan },
    Conditional { test: Box<Expr>, consequent: Box<Expr>, alternate: Box<Expr>, span: TextSpan },
    ArrayLiteral { elements: Vec<Expr>, span: TextSpan },
    ObjectLiteral { properties: Vec<ObjectProperty>, span: TextSpan },
    /// A template literal with no tag: alternating string parts and
    /// embedded expressions, `parts.len() == exprs.len() + 1`.
    Template { parts: Vec<String>, exprs: Vec<Expr>, span: TextSpan },
    TaggedTemplate { tag: Box<Expr>, parts: Vec<String>, exprs: Vec<Expr>, span: TextSpan },
    PrimitiveLiteral { value: Primitive, span: TextSpan },
    /// `expr & behaviorName:arg1:arg2`.
    BindingBehavior { expr: Box<Expr>, behavior: NamedArgs, span: TextSpan },
    /// `expr | converterName:arg1:arg2`.
    ValueConverter { expr: Box<Expr>, converter: NamedArgs, span: TextSpan },
    /// A recovery node produced when the parser could not make sense of a
    /// span of source. `reason_kind` preserves why, for later diagnostics;
    /// this is the one place an "any-case" fallback is permitted, and it is
    /// explicit rather than silent.
    UnknownStatement { reason_kind: String, span: TextSpan },
}

impl Expr {
    pub fn span(&self) -> TextSpan {
        match self {
            Expr::AccessScope { span, .. }
            | Expr::AccessThis { span, .. }
            | Expr::AccessMember { span, .. }
            | Expr::AccessKeyed { span, .. }
            | Expr::CallScope { span, .. }
            | Expr::CallMember { span, .. }
            | Expr::CallFunction { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Assign { span, .. }
            | Expr::Conditional { span, .. }
            | Expr::ArrayLiteral { span, .. }
            | Expr::ObjectLiteral { span, .. }
            | Expr::Template { span, .. }
            | Expr::TaggedTemplate { span, .. }
            | Expr::PrimitiveLiteral { span, .. }
            | Expr::BindingBehavior { span, .. }
            | Expr::ValueConverter { span, .. }
            | Expr::UnknownStatement { span, .. } => *span,
        }
    }

    pub fn is_assignable(&self) -> bool {
        matches!(self, Expr::AccessScope { .. } | Expr::AccessMember { .. } | Expr::AccessKeyed { .. })
    }

    pub fn is_recovery(&self) -> bool {
        matches!(self, Expr::UnknownStatement { .. })
    }

    /// Strip outer `ValueConverter`/`BindingBehavior` wrappers, returning
    /// the underlying expression they decorate. Type checking and scope
    /// binding both need the "real" expression, not its pipe chain.
    pub fn unwrap_decorators(&self) -> &Expr {
        match self {
            Expr::ValueConverter { expr, .. } | Expr::BindingBehavior { expr, .. } => expr.unwrap_decorators(),
            other => other,
        }
    }

    /// Rebuild this tree with every span shifted by `delta`. The parser
    /// always produces spans relative to the slice of source text it was
    /// given; lowering hands it attribute values and interpolation segments
    /// that start partway through the document, so every parsed tree needs
    /// its spans re-based onto the document before it is stored.
    pub fn offset(&self, delta: i64) -> Expr {
        let sp = |s: &TextSpan| s.offset(delta);
        match self {
            Expr::AccessScope { name, ancestors, span } => {
                Expr::AccessScope { name: name.clone(), ancestors: *ancestors, span: sp(span) }
            }
            Expr::AccessThis { ancestors, span } => Expr::AccessThis { ancestors: *ancestors, span: sp(span) },
            Expr::AccessMember { object, name, optional, span } => Expr::AccessMember {
                object: Box::new(object.offset(delta)),
                name: name.clone(),
                optional: *optional,
                span: sp(span),
            },
            Expr::AccessKeyed { object, key, optional, span } => Expr::AccessKeyed {
                object: Box::new(object.offset(delta)),
                key: Box::new(key.offset(delta)),
                optional: *optional,
                span: sp(span),
            },
            Expr::CallScope { name, ancestors, args, span } => Expr::CallScope {
                name: name.clone(),
                ancestors: *ancestors,
                args: args.iter().map(|a| a.offset(delta)).collect(),
                span: sp(span),
            },
            Expr::CallMember { object, name, args, optional, span } => Expr::CallMember {
                object: Box::new(object.offset(delta)),
                name: name.clone(),
                args: args.iter().map(|a| a.offset(delta)).collect(),
                optional: *optional,
                span: sp(span),
            },
            Expr::CallFunction { callee, args, span } => Expr::CallFunction {
                callee: Box::new(callee.offset(delta)),
                args: args.iter().map(|a| a.offset(delta)).collect(),
                span: sp(span),
            },
            Expr::Binary { op, left, right, span } => {
                Expr::Binary { op: *op, left: Box::new(left.offset(delta)), right: Box::new(right.offset(delta)), span: sp(span) }
            }
            Expr::Unary { op, operand, span } => Expr::Unary { op: *op, operand: Box::new(operand.offset(delta)), span: sp(span) },
            Expr::Assign { target, value, span } => {
                Expr::Assign { target: Box::new(target.offset(delta)), value: Box::new(value.offset(delta)), span: sp(span) }
            }
            Expr::Conditional { test, consequent, alternate, span } => Expr::Conditional {
                test: Box::new(test.offset(delta)),
                consequent: Box::new(consequent.offset(delta)),
                alternate: Box::new(alternate.offset(delta)),
                span: sp(span),
            },
            Expr::ArrayLiteral { elements, span } => {
                Expr::ArrayLiteral { elements: elements.iter().map(|e| e.offset(delta)).collect(), span: sp(span) }
            }
            Expr::ObjectLiteral { properties, span } => Expr::ObjectLiteral {
                properties: properties
                    .iter()
                    .map(|p| ObjectProperty { key: p.key.clone(), value: p.value.offset(delta), computed: p.computed })
                    .collect(),
                span: sp(span),
            },
            Expr::Template { parts, exprs, span } => {
                Expr::Template { parts: parts.clone(), exprs: exprs.iter().map(|e| e.offset(delta)).collect(), span: sp(span) }
            }
            Expr::TaggedTemplate { tag, parts, exprs, span } => Expr::TaggedTemplate {
                tag: Box::new(tag.offset(delta)),
                parts: parts.clone(),
                exprs: exprs.iter().map(|e| e.offset(delta)).collect(),
                span: sp(span),
            },
            Expr::PrimitiveLiteral { value, span } => Expr::PrimitiveLiteral { value: value.clone(), span: sp(span) },
            Expr::BindingBehavior { expr, behavior, span } => Expr::BindingBehavior {
                expr: Box::new(expr.offset(delta)),
                behavior: NamedArgs { name: behavior.name.clone(), args: behavior.args.iter().map(|a| a.offset(delta)).collect() },
                span: sp(span),
            },
            Expr::ValueConverter { expr, converter, span } => Expr::ValueConverter {
                expr: Box::new(expr.offset(delta)),
                converter: NamedArgs { name: converter.name.clone(), args: converter.args.iter().map(|a| a.offset(delta)).collect() },
                span: sp(span),
            },
            Expr::UnknownStatement { reason_kind, span } => Expr::UnknownStatement { reason_kind: reason_kind.clone(), span: sp(span) },
        }
    }
}
