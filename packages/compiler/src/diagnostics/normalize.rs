//! Normalize: resolve a [`RawDiagnostic`] against the catalog, filling in
//! defaults and rejecting non-canonical codes (§4.9 "Normalize").

use thiserror::Error;

use super::catalog::{self, SpanRequirement, SpecStatus};
use super::{Confidence, RawDiagnostic, Severity};

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("diagnostic code {0:?} is not registered in the catalog")]
    UnknownCode(String),
    #[error("diagnostic code {0:?} has status {1:?} and cannot be emitted")]
    RejectedStatus(String, &'static str),
    #[error("diagnostic code {0:?} requires a span but none was provided")]
    MissingRequiredSpan(String),
}

/// A diagnostic with its catalog-derived fields resolved, severity and
/// confidence filled from defaults where the instance didn't override
/// them, but before demotion/policy have run.
#[derive(Debug, Clone)]
pub struct NormalizedDiagnostic {
    pub raw: RawDiagnostic,
    pub severity: Severity,
    pub confidence: Confidence,
}

pub fn normalize(raw: RawDiagnostic) -> Result<NormalizedDiagnostic, NormalizeError> {
    let spec = catalog::lookup(&raw.code).ok_or_else(|| NormalizeError::UnknownCode(raw.code.clone()))?;

    match spec.status {
        SpecStatus::Canonical | SpecStatus::Proposed => {}
        SpecStatus::Legacy => return Err(NormalizeError::RejectedStatus(raw.code.clone(), "legacy")),
        SpecStatus::Deprecated => return Err(NormalizeError::RejectedStatus(raw.code.clone(), "deprecated")),
    }

    if matches!(spec.span, SpanRequirement::Span) && raw.span.is_none() {
        return Err(NormalizeError::MissingRequiredSpan(raw.code.clone()));
    }

    let severity = raw.severity.unwrap_or(spec.default_severity);
    let confidence = raw.confidence.unwrap_or(spec.default_confidence);

    Ok(NormalizedDiagnostic { raw, severity, confidence })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_code() {
        let raw = RawDiagnostic::new("aurelia/not-a-thing", "boom");
        assert!(matches!(normalize(raw), Err(NormalizeError::UnknownCode(_))));
    }

    #[test]
    fn fills_default_severity() {
        let raw = RawDiagnostic::new("aurelia/unknown-bindable", "no such bindable")
            .with_span(crate::span::SourceSpan::new(crate::span::TextSpan::new(0, 1), None));
        let normalized = normalize(raw).unwrap();
        assert_eq!(normalized.severity, Severity::Warning);
    }

    #[test]
    fn requires_span_when_spec_demands_it() {
        let raw = RawDiagnostic::new("aurelia/expr-parse-error", "bad expr");
        assert!(matches!(normalize(raw), Err(NormalizeError::MissingRequiredSpan(_))));
    }
}
