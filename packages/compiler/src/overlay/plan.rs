//! Overlay planning (§4.7 "Plan"): group expressions by frame and describe
//! each frame's synthetic context type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::identity::{ExprId, FrameId};
use crate::scope::ScopeBindResult;
use crate::template::instruction::ExprTableEntry;
use crate::template::lower::IrModule;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LambdaPlan {
    pub expr_id: ExprId,
}

/// One frame's worth of synthetic type plus the expressions that evaluate
/// inside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameDescriptor {
    pub frame_id: FrameId,
    pub type_name: String,
    pub type_expr: String,
    pub lambdas: Vec<LambdaPlan>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverlayPlan {
    pub frames: Vec<FrameDescriptor>,
}

/// Render a frame's locals as a TypeScript-ish object-type literal. The root
/// frame's `$this` local becomes the type alias itself (no wrapper object);
/// every other frame exposes its locals as named members, plus `$parent` so
/// `$parent`-chain rewrites in [`super::emit`] type-check against something.
fn frame_type_expr(frame_id: FrameId, scope: &ScopeBindResult) -> String {
    let frame = match scope.frame(frame_id) {
        Some(f) => f,
        None => return "unknown".to_string(),
    };
    if frame_id == FrameId::ROOT {
        return frame.locals.get("$this").cloned().unwrap_or_else(|| "unknown".to_string());
    }
    let mut members: Vec<String> = frame
        .locals
        .iter()
        .map(|(name, ty)| format!("{}: {}", name, ty))
        .collect();
    members.sort();
    if let Some(parent) = frame.parent {
        members.push(format!("$parent: Frame{}", parent.0));
    }
    format!("{{ {} }}", members.join("; "))
}

/// Group every expression in `module.expr_table` by the frame the scope
/// binder assigned it, producing one [`FrameDescriptor`] per frame that has
/// at least one expression or that is the root.
pub fn plan(module: &IrModule, scope: &ScopeBindResult) -> OverlayPlan {
    let mut by_frame: BTreeMap<FrameId, Vec<ExprId>> = BTreeMap::new();
    by_frame.entry(FrameId::ROOT).or_default();
    for entry in &module.expr_table {
        let frame = scope.expr_frame.get(&entry.id).copied().unwrap_or(FrameId::ROOT);
        by_frame.entry(frame).or_default().push(entry.id);
    }

    let frames = by_frame
        .into_iter()
        .map(|(frame_id, mut expr_ids)| {
            expr_ids.sort_by_key(|id| id.0);
            FrameDescriptor {
                type_name: format!("Frame{}", frame_id.0),
                type_expr: frame_type_expr(frame_id, scope),
                lambdas: expr_ids.into_iter().map(|expr_id| LambdaPlan { expr_id }).collect(),
                frame_id,
            }
        })
        .collect();

    OverlayPlan { frames }
}

pub(super) fn find_entry<'a>(module: &'a IrModule, id: ExprId) -> Option<&'a ExprTableEntry> {
    module.expr_table.iter().find(|e| e.id == id)
}
