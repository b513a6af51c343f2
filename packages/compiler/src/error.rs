//! Engine-level errors (§7 "Engine errors"): programmer mistakes and
//! infrastructure failures, never user-facing diagnostics. These are
//! returned as `Result<_, EngineError>`, never panicked.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown pipeline stage: {0}")]
    UnknownStage(String),

    #[error("missing required option: {0}")]
    MissingOption(&'static str),

    #[error("cycle detected in stage dependency graph at {0}")]
    DependencyCycle(String),

    #[error("stage `{stage}` failed: {source}")]
    StageFailed { stage: String, source: anyhow::Error },

    #[error("compilation cancelled at stage `{0}`")]
    Cancelled(String),

    #[error("cache I/O error (non-fatal, recompute proceeded): {0}")]
    CacheIo(String),
}
