//! The template IR's DOM shape and template-origin sum (§3 "Template IR").

use serde::{Deserialize, Serialize};

use crate::identity::{NodeId, TemplateId};
use crate::span::TextSpan;
use crate::template::instruction::InstructionRow;

/// A `(TemplateId, NodeId)` address, used instead of direct pointers to
/// break the cyclic dom ↔ origin ↔ template reference graph (§9).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddress {
    pub template: TemplateId,
    pub node: NodeId,
}

/// A template controller branch discriminant (`switch`'s `case`/`default`,
/// `promise`'s `then`/`catch`/`pending`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Branch {
    Then,
    Catch,
    Pending,
    Case,
    Default,
}

/// Why a given [`TemplateIr`] exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum Origin {
    Root { file: String },
    Controller { host: NodeAddress, controller: String },
    Branch { host: NodeAddress, branch: Branch },
    Projection { host: NodeAddress, slot: String },
    Synthetic { reason: String },
}

/// One attribute on an [`DomNode::Element`], pre-instruction-expansion: its
/// raw name/value text and spans, used by lowering to recover attribute
/// name/value spans (§4.2 "Span precision") before the attribute parser
/// turns it into a binding command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAttr {
    pub name: String,
    pub value: String,
    pub name_span: TextSpan,
    pub value_span: TextSpan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Namespace {
    Html,
    Svg,
    MathMl,
}

/// The template IR's DOM node sum (§3 "DomNode variant").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum DomNode {
    Element {
        id: NodeId,
        ns: Namespace,
        tag: String,
        attrs: Vec<RawAttr>,
        children: Vec<DomNode>,
        self_closed: bool,
        loc: TextSpan,
        tag_loc: TextSpan,
        close_tag_loc: Option<TextSpan>,
    },
    /// A `<template>` element, or a synthetic template wrapper produced by
    /// splitting a controller host out of its subtree.
    Template {
        id: NodeId,
        attrs: Vec<RawAttr>,
        content: Vec<DomNode>,
        loc: TextSpan,
    },
    Text {
        id: NodeId,
        text: String,
        loc: TextSpan,
    },
    Comment {
        id: NodeId,
        text: String,
        loc: TextSpan,
    },
}

impl DomNode {
    pub fn id(&self) -> &NodeId {
        match self {
            DomNode::Element { id, .. } => id,
            DomNode::Template { id, .. } => id,
            DomNode::Text { id, .. } => id,
            DomNode::Comment { id, .. } => id,
        }
    }

    pub fn loc(&self) -> TextSpan {
        match self {
            DomNode::Element { loc, .. } => *loc,
            DomNode::Template { loc, .. } => *loc,
            DomNode::Text { loc, .. } => *loc,
            DomNode::Comment { loc, .. } => *loc,
        }
    }

    pub fn children(&self) -> &[DomNode] {
        match self {
            DomNode::Element { children, .. } => children,
            DomNode::Template { content, .. } => content,
            DomNode::Text { .. } | DomNode::Comment { .. } => &[],
        }
    }

    /// Depth-first pre-order walk over this node and all descendants.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a DomNode)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    pub fn find<'a>(&'a self, id: &NodeId) -> Option<&'a DomNode> {
        if self.id() == id {
            return Some(self);
        }
        for child in self.children() {
            if let Some(found) = child.find(id) {
                return Some(found);
            }
        }
        None
    }
}

/// One compiled template: its DOM, its instruction rows, and where it came
/// from. Nested templates produced by controllers/projections are stored
/// in the owning [`crate::template::lower::IrModule`], not inline here;
/// `def` fields on `hydrateTemplateController` instructions reference them
/// by [`TemplateId`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateIr {
    pub id: TemplateId,
    pub dom: DomNode,
    pub rows: Vec<InstructionRow>,
    pub origin: Origin,
}

impl TemplateIr {
    /// Invariant (i): every `InstructionRow.target` exists in this
    /// template's DOM.
    pub fn rows_reference_known_nodes(&self) -> bool {
        self.rows.iter().all(|row| self.dom.find(&row.target).is_some())
    }
}
