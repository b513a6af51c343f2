//! The diagnostics engine (C10): catalog, emitter, normalize, demote,
//! policy, route (§4.9).

pub mod catalog;
pub mod demote;
pub mod emitter;
pub mod format;
pub mod normalize;
pub mod policy;
pub mod route;

use serde::{Deserialize, Serialize};

use crate::span::SourceSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Suppressed,
    /// Policy `"off"` with a non-blocking diagnostic: it is not emitted to
    /// any surface but is retained in debug output.
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvidenceRegime {
    GrammarDeterministic,
    BehavioralDependent,
    CatalogDependent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Impact {
    Blocking,
    NonBlocking,
    Informational,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actionability {
    Actionable,
    Informational,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Surface {
    Cli,
    Lsp,
    Aot,
    Debug,
}

/// A diagnostic as emitted by a stage, before catalog normalization. Spans
/// are optional here because a stage may not yet know where an error's
/// span belongs (a project-level gap, for instance); [`normalize`] enforces
/// that `span.span = "span"` codes carry one before anything downstream
/// sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDiagnostic {
    pub code: String,
    pub message: String,
    pub severity: Option<Severity>,
    pub span: Option<SourceSpan>,
    pub data: serde_json::Value,
    pub related: Vec<RawDiagnostic>,
    /// Per-instance confidence; falls back to the catalog's
    /// `defaultConfidence` when absent.
    pub confidence: Option<Confidence>,
    /// Set by a stage that recovered from a parse error; downstream stages
    /// consult this to suppress chained complaints (§7).
    pub recovery: bool,
}

impl RawDiagnostic {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        RawDiagnostic {
            code: code.into(),
            message: message.into(),
            severity: None,
            span: None,
            data: serde_json::Value::Null,
            related: Vec::new(),
            confidence: None,
            recovery: false,
        }
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn as_recovery(mut self) -> Self {
        self.recovery = true;
        self
    }
}

/// A diagnostic after normalization + demotion + policy have all run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedDiagnostic {
    pub code: String,
    pub message: String,
    pub severity: Severity,
    pub span: Option<SourceSpan>,
    pub data: serde_json::Value,
    pub related: Vec<RawDiagnostic>,
    pub surfaces: Vec<Surface>,
    pub aur_code: Option<String>,
}
