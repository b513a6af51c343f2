//! Template lowering (C4): HTML → IR with stable node/expression ids and
//! authored spans.

pub mod attr;
pub mod dom;
pub mod html;
pub mod instruction;
pub mod lower;

pub use dom::{DomNode, Origin, TemplateIr};
pub use instruction::{BindingMode, BindingSource, ExprRef, Instruction, InstructionRow};
pub use lower::{lower_template, IrModule, LowerOptions, ModuleMeta};
