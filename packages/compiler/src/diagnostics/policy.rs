//! Policy: defaults → category override → code override → surface override
//! → mode override (§4.9 "Policy").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::catalog::DiagnosticSpec;
use super::normalize::NormalizedDiagnostic;
use super::Severity;

/// The declarative severity-override policy. Each layer is optional; later
/// layers win. `surfaces` keys a per-surface override map so "route to LSP
/// only at warning" style policies are expressible without a code override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticPolicy {
    pub default_severity: Option<Severity>,
    pub category_overrides: HashMap<String, Severity>,
    pub code_overrides: HashMap<String, Severity>,
    pub surface_overrides: HashMap<String, HashMap<String, Severity>>,
    pub mode_override: Option<Severity>,
    /// When `true`, a diagnostic with `severity:"off"` and
    /// `impact:"blocking"` is still emitted rather than suppressed.
    pub allow_suppress_blocking: bool,
}

pub fn apply_policy(normalized: NormalizedDiagnostic, spec: &DiagnosticSpec, policy: &DiagnosticPolicy, surface_key: &str) -> NormalizedDiagnostic {
    let mut severity = normalized.severity;

    if let Some(default) = policy.default_severity {
        severity = default;
    }
    if let Some(cat) = policy.category_overrides.get(spec.category) {
        severity = *cat;
    }
    if let Some(code) = policy.code_overrides.get(spec.code) {
        severity = *code;
    }
    if let Some(surface_map) = policy.surface_overrides.get(surface_key) {
        if let Some(s) = surface_map.get(spec.code) {
            severity = *s;
        }
    }
    if let Some(mode) = policy.mode_override {
        severity = mode;
    }

    if severity == Severity::Off {
        let blocking = matches!(spec.impact, super::Impact::Blocking);
        if blocking && !policy.allow_suppress_blocking {
            severity = spec.default_severity;
        } else {
            severity = Severity::Suppressed;
        }
    }

    NormalizedDiagnostic { severity, ..normalized }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::catalog;
    use crate::diagnostics::normalize::normalize;
    use crate::diagnostics::RawDiagnostic;

    #[test]
    fn off_suppresses_non_blocking() {
        let spec = catalog::lookup("aurelia/unknown-bindable").unwrap();
        let raw = RawDiagnostic::new("aurelia/unknown-bindable", "x")
            .with_span(crate::span::SourceSpan::new(crate::span::TextSpan::new(0, 1), None));
        let normalized = normalize(raw).unwrap();
        let mut policy = DiagnosticPolicy::default();
        policy.code_overrides.insert("aurelia/unknown-bindable".into(), Severity::Off);
        let resolved = apply_policy(normalized, spec, &policy, "cli");
        assert_eq!(resolved.severity, Severity::Suppressed);
    }

    #[test]
    fn off_on_blocking_is_rejected_by_default() {
        let spec = catalog::lookup("aurelia/expr-parse-error").unwrap();
        let raw = RawDiagnostic::new("aurelia/expr-parse-error", "x")
            .with_span(crate::span::SourceSpan::new(crate::span::TextSpan::new(0, 1), None));
        let normalized = normalize(raw).unwrap();
        let mut policy = DiagnosticPolicy::default();
        policy.code_overrides.insert("aurelia/expr-parse-error".into(), Severity::Off);
        let resolved = apply_policy(normalized, spec, &policy, "cli");
        assert_eq!(resolved.severity, spec.default_severity);
    }
}
