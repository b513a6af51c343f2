//! `StageKey`: the closed set of pipeline stages and their static
//! dependency edges (§4.1).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StageKey {
    Lower,
    Resolve,
    Bind,
    Typecheck,
    Usage,
    OverlayPlan,
    OverlayEmit,
    AotPlan,
}

impl StageKey {
    pub const ALL: [StageKey; 8] = [
        StageKey::Lower,
        StageKey::Resolve,
        StageKey::Bind,
        StageKey::Typecheck,
        StageKey::Usage,
        StageKey::OverlayPlan,
        StageKey::OverlayEmit,
        StageKey::AotPlan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKey::Lower => "lower",
            StageKey::Resolve => "resolve",
            StageKey::Bind => "bind",
            StageKey::Typecheck => "typecheck",
            StageKey::Usage => "usage",
            StageKey::OverlayPlan => "overlay:plan",
            StageKey::OverlayEmit => "overlay:emit",
            StageKey::AotPlan => "aot:plan",
        }
    }

    /// Static dependency edges. `resolve` and `bind` both only need
    /// `lower`'s IR; `overlay:emit` additionally depends on `resolve` so the
    /// emitter can report degraded member spans for unknown targets the same
    /// run that resolved them.
    pub fn deps(&self) -> &'static [StageKey] {
        match self {
            StageKey::Lower => &[],
            StageKey::Resolve => &[StageKey::Lower],
            StageKey::Bind => &[StageKey::Lower],
            StageKey::Typecheck => &[StageKey::Resolve, StageKey::Bind],
            StageKey::Usage => &[StageKey::Resolve, StageKey::Bind],
            StageKey::OverlayPlan => &[StageKey::Bind],
            StageKey::OverlayEmit => &[StageKey::OverlayPlan, StageKey::Resolve],
            StageKey::AotPlan => &[StageKey::OverlayEmit, StageKey::Typecheck],
        }
    }

    /// Bumped whenever a stage's output shape or algorithm changes; embedded
    /// in the cache key so old blobs are shadowed rather than misread.
    pub fn version(&self) -> &'static str {
        match self {
            StageKey::Lower => "1",
            StageKey::Resolve => "1",
            StageKey::Bind => "1",
            StageKey::Typecheck => "1",
            StageKey::Usage => "1",
            StageKey::OverlayPlan => "1",
            StageKey::OverlayEmit => "1",
            StageKey::AotPlan => "1",
        }
    }

    pub fn from_str(s: &str) -> Option<StageKey> {
        StageKey::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl std::fmt::Display for StageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Topological check over the static `deps()` table. Run once, at registry
/// construction, not per session: the closed `StageKey` set makes the graph
/// fixed, so a cycle here is a bug in this file, never caller input.
pub fn assert_acyclic() -> Result<(), crate::error::EngineError> {
    fn visit(key: StageKey, visiting: &mut Vec<StageKey>, done: &mut Vec<StageKey>) -> Result<(), crate::error::EngineError> {
        if done.contains(&key) {
            return Ok(());
        }
        if visiting.contains(&key) {
            return Err(crate::error::EngineError::DependencyCycle(key.to_string()));
        }
        visiting.push(key);
        for dep in key.deps() {
            visit(*dep, visiting, done)?;
        }
        visiting.pop();
        done.push(key);
        Ok(())
    }

    let mut visiting = Vec::new();
    let mut done = Vec::new();
    for key in StageKey::ALL {
        visit(key, &mut visiting, &mut done)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_stages_round_trip_through_as_str() {
        for key in StageKey::ALL {
            assert_eq!(StageKey::from_str(key.as_str()), Some(key));
        }
    }

    #[test]
    fn static_graph_is_acyclic() {
        assert!(assert_acyclic().is_ok());
    }
}
