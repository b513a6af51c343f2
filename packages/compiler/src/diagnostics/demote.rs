//! Demote by confidence × evidence regime (§4.9 "Demote").
//!
//! Demotion only ever lowers severity; for a fixed `(evidenceRegime,
//! severity)`, a lower confidence never raises it back up (§8 invariant 8).

use super::catalog::DiagnosticSpec;
use super::normalize::NormalizedDiagnostic;
use super::{Confidence, EvidenceRegime, Severity};

pub fn demote(normalized: NormalizedDiagnostic, spec: &DiagnosticSpec) -> NormalizedDiagnostic {
    let demoted = demote_severity(normalized.severity, normalized.confidence, spec.evidence_regime);
    NormalizedDiagnostic { severity: demoted, ..normalized }
}

fn demote_severity(severity: Severity, confidence: Confidence, regime: EvidenceRegime) -> Severity {
    match regime {
        EvidenceRegime::GrammarDeterministic => severity,
        EvidenceRegime::BehavioralDependent => cap_at_info(severity),
        EvidenceRegime::CatalogDependent => match confidence {
            Confidence::High => severity,
            Confidence::Medium => match severity {
                Severity::Error => Severity::Warning,
                Severity::Warning => Severity::Info,
                other => other,
            },
            Confidence::Low => match severity {
                Severity::Error => Severity::Info,
                Severity::Warning => Severity::Suppressed,
                other => other,
            },
        },
    }
}

fn cap_at_info(severity: Severity) -> Severity {
    match severity {
        Severity::Error | Severity::Warning | Severity::Info => Severity::Info,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rank(s: Severity) -> u8 {
        match s {
            Severity::Error => 4,
            Severity::Warning => 3,
            Severity::Info => 2,
            Severity::Suppressed => 1,
            Severity::Off => 0,
        }
    }

    #[test]
    fn catalog_dependent_high_unchanged() {
        assert_eq!(
            demote_severity(Severity::Error, Confidence::High, EvidenceRegime::CatalogDependent),
            Severity::Error
        );
    }

    #[test]
    fn catalog_dependent_low_demotes_error_to_info() {
        assert_eq!(
            demote_severity(Severity::Error, Confidence::Low, EvidenceRegime::CatalogDependent),
            Severity::Info
        );
    }

    #[test]
    fn behavioral_dependent_caps_at_info() {
        assert_eq!(
            demote_severity(Severity::Error, Confidence::High, EvidenceRegime::BehavioralDependent),
            Severity::Info
        );
    }

    #[test]
    fn grammar_deterministic_is_exempt() {
        assert_eq!(
            demote_severity(Severity::Error, Confidence::Low, EvidenceRegime::GrammarDeterministic),
            Severity::Error
        );
    }

    #[test]
    fn monotonicity_lower_confidence_never_raises_severity() {
        let regime = EvidenceRegime::CatalogDependent;
        for severity in [Severity::Error, Severity::Warning, Severity::Info] {
            let high = demote_severity(severity, Confidence::High, regime);
            let medium = demote_severity(severity, Confidence::Medium, regime);
            let low = demote_severity(severity, Confidence::Low, regime);
            assert!(rank(low) <= rank(medium));
            assert!(rank(medium) <= rank(high));
        }
    }
}
