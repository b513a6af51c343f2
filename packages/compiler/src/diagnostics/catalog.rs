//! The diagnostic catalog: `DiagnosticSpec` is the authoritative registry
//! per code (§3 "Diagnostics").

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::{Actionability, EvidenceRegime, Impact, Severity, Surface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecStatus {
    Canonical,
    Proposed,
    Legacy,
    Deprecated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanRequirement {
    Span,
    Optional,
}

#[derive(Debug, Clone)]
pub struct DiagnosticSpec {
    pub code: &'static str,
    pub category: &'static str,
    pub status: SpecStatus,
    pub default_severity: Severity,
    pub impact: Impact,
    pub actionability: Actionability,
    pub span: SpanRequirement,
    pub stages: &'static [&'static str],
    pub surfaces: &'static [Surface],
    pub default_confidence: super::Confidence,
    pub evidence_regime: EvidenceRegime,
    pub fp_risk_tier: u8,
    pub aur_code: Option<&'static str>,
}

macro_rules! spec {
    ($code:expr, $category:expr, $status:expr, $sev:expr, $impact:expr, $act:expr, $span:expr,
     $stages:expr, $surfaces:expr, $conf:expr, $regime:expr, $fp:expr, $aur:expr) => {
        DiagnosticSpec {
            code: $code,
            category: $category,
            status: $status,
            default_severity: $sev,
            impact: $impact,
            actionability: $act,
            span: $span,
            stages: $stages,
            surfaces: $surfaces,
            default_confidence: $conf,
            evidence_regime: $regime,
            fp_risk_tier: $fp,
            aur_code: $aur,
        }
    };
}

static CATALOG: Lazy<HashMap<&'static str, DiagnosticSpec>> = Lazy::new(|| {
    use super::Confidence::*;
    use Actionability::*;
    use EvidenceRegime::*;
    use Impact::*;
    use Severity::*;
    use SpanRequirement::*;
    use SpecStatus::*;

    let specs = vec![
        spec!(
            "aurelia/expr-parse-error",
            "parse",
            Canonical,
            Error,
            Blocking,
            Actionable,
            Span,
            &["lower"],
            &[Surface::Cli, Surface::Lsp, Surface::Aot],
            High,
            GrammarDeterministic,
            0,
            Some("AUR0101")
        ),
        spec!(
            "aurelia/invalid-binding-pattern",
            "parse",
            Canonical,
            Error,
            Blocking,
            Actionable,
            Span,
            &["lower"],
            &[Surface::Cli, Surface::Lsp, Surface::Aot],
            High,
            GrammarDeterministic,
            0,
            Some("AUR0102")
        ),
        spec!(
            "aurelia/invalid-command-usage",
            "parse",
            Canonical,
            Error,
            Blocking,
            Actionable,
            Span,
            &["lower"],
            &[Surface::Cli, Surface::Lsp, Surface::Aot],
            High,
            GrammarDeterministic,
            0,
            None
        ),
        spec!(
            "aurelia/unknown-bindable",
            "resolution",
            Canonical,
            Warning,
            NonBlocking,
            Actionable,
            Span,
            &["resolve"],
            &[Surface::Cli, Surface::Lsp],
            Medium,
            CatalogDependent,
            1,
            Some("AUR0103")
        ),
        spec!(
            "aurelia/alias-conflict",
            "resolution",
            Canonical,
            Warning,
            NonBlocking,
            Actionable,
            Span,
            &["resolve"],
            &[Surface::Cli, Surface::Lsp],
            Medium,
            CatalogDependent,
            1,
            None
        ),
        spec!(
            "aurelia/bindable-decl-conflict",
            "project",
            Canonical,
            Warning,
            NonBlocking,
            Actionable,
            Span,
            &["resolve"],
            &[Surface::Cli, Surface::Lsp],
            Medium,
            CatalogDependent,
            1,
            None
        ),
        spec!(
            "aurelia/unresolved-import",
            "project",
            Canonical,
            Warning,
            NonBlocking,
            Actionable,
            Span,
            &["resolve"],
            &[Surface::Cli, Surface::Lsp],
            Medium,
            CatalogDependent,
            1,
            None
        ),
        spec!(
            "aurelia/missing-required-bindable",
            "resolution",
            Canonical,
            Error,
            Blocking,
            Actionable,
            Span,
            &["resolve"],
            &[Surface::Cli, Surface::Lsp, Surface::Aot],
            High,
            CatalogDependent,
            0,
            Some("AUR0104")
        ),
        spec!(
            "aurelia/expr-type-mismatch",
            "typecheck",
            Canonical,
            Warning,
            NonBlocking,
            Actionable,
            Span,
            &["typecheck"],
            &[Surface::Cli, Surface::Lsp],
            Medium,
            CatalogDependent,
            2,
            None
        ),
        spec!(
            "aurelia/project/orphan-element",
            "project",
            Canonical,
            Info,
            Informational,
            Informational,
            Optional,
            &["usage"],
            &[Surface::Cli, Surface::Lsp],
            Medium,
            BehavioralDependent,
            1,
            None
        ),
        spec!(
            "aurelia/project/unanalyzable-decorator",
            "project",
            Canonical,
            Info,
            Informational,
            Informational,
            Optional,
            &["resolve"],
            &[Surface::Cli, Surface::Lsp],
            Medium,
            BehavioralDependent,
            1,
            None
        ),
        spec!(
            "aurelia/project/field-conflict",
            "project",
            Canonical,
            Warning,
            NonBlocking,
            Actionable,
            Optional,
            &["resolve"],
            &[Surface::Cli, Surface::Lsp],
            High,
            CatalogDependent,
            1,
            None
        ),
        spec!(
            "aurelia/policy/confidence",
            "policy",
            Canonical,
            Info,
            Informational,
            Informational,
            Optional,
            &["overlay:plan", "overlay:emit"],
            &[Surface::Debug],
            Medium,
            BehavioralDependent,
            1,
            None
        ),
        spec!(
            "aurelia/infrastructure/stage-failed",
            "infrastructure",
            Canonical,
            Error,
            Blocking,
            Informational,
            Optional,
            &["*"],
            &[Surface::Cli, Surface::Lsp, Surface::Debug],
            High,
            GrammarDeterministic,
            0,
            None
        ),
    ];

    specs.into_iter().map(|s| (s.code, s)).collect()
});

pub fn lookup(code: &str) -> Option<&'static DiagnosticSpec> {
    CATALOG.get(code)
}

pub fn is_registered(code: &str) -> bool {
    CATALOG.contains_key(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_expr_parse_error() {
        let spec = lookup("aurelia/expr-parse-error").unwrap();
        assert_eq!(spec.default_severity, Severity::Error);
        assert_eq!(spec.status, SpecStatus::Canonical);
    }

    #[test]
    fn unknown_code_is_absent() {
        assert!(lookup("aurelia/does-not-exist").is_none());
    }
}
