//! The instruction closed sum and the expression table (§3).

use serde::{Deserialize, Serialize};

use crate::expr::ast::Expr;
use crate::identity::{ExprId, NodeId, TemplateId};
use crate::span::TextSpan;
use crate::template::dom::Branch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindingMode {
    OneTime,
    ToView,
    FromView,
    TwoWay,
}

/// A reference to an entry in the owning module's expression table,
/// carrying the authored location it was parsed from (invariant ii: every
/// `ExprRef.id` must have a matching [`ExprTableEntry`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExprRef {
    pub id: ExprId,
    pub loc: TextSpan,
}

/// The right-hand side of a binding: either a single expression or an
/// interpolation made of alternating literal parts and expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum BindingSource {
    ExprRef(ExprRef),
    Interp { parts: Vec<String>, exprs: Vec<ExprRef> },
}

/// One property on a `hydrateElement`/`hydrateAttribute`/
/// `hydrateTemplateController` instruction: a bindable name paired with its
/// source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydrateProp {
    pub to: String,
    pub from: BindingSource,
}

/// The `<local> of <iterable>` microsyntax bound by `repeat.for`. Kept
/// separate from the generic `props` list because the local name is a
/// declaration, not a binding source: the scope binder reads it directly
/// rather than resolving it as an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForOfDeclaration {
    pub local: String,
    pub iterable: ExprRef,
}

/// The instruction closed sum (§3). Every traversal over this type is an
/// exhaustive `match`; there is deliberately no catch-all arm so adding a
/// variant forces every consumer to be updated (§9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum Instruction {
    PropertyBinding { to: String, from: BindingSource, mode: BindingMode },
    AttributeBinding { attr: String, to: String, from: BindingSource },
    StylePropertyBinding { to: String, from: BindingSource },
    ListenerBinding { to: String, from: BindingSource, capture: bool, modifier: Option<String> },
    RefBinding { to: String },
    TextBinding { from: BindingSource },
    SetAttribute { name: String, value: String },
    SetClassAttribute { value: String },
    SetStyleAttribute { value: String },
    SetProperty { to: String, value: String },
    HydrateElement { res: String, props: Vec<HydrateProp>, containerless: bool },
    HydrateAttribute { res: String, props: Vec<HydrateProp>, alias: Option<String> },
    HydrateTemplateController {
        res: String,
        props: Vec<HydrateProp>,
        def: TemplateId,
        branch: Option<Branch>,
        for_of: Option<ForOfDeclaration>,
        /// The declared local name for `promise`'s `then.from-view`/
        /// `catch.from-view`, when present.
        branch_local: Option<String>,
    },
    HydrateLetElement { instructions: Vec<HydrateProp>, to_binding_context: bool },
}

/// All instructions targeting a single DOM node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionRow {
    pub target: NodeId,
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpressionType {
    IsProperty,
    IsFunction,
    Interp,
}

/// The authoritative store for every parsed expression in a module
/// (invariant ii / iii).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExprTableEntry {
    pub id: ExprId,
    pub expression_type: ExpressionType,
    pub ast: Expr,
    pub span: TextSpan,
}
