//! Route: `spec.surfaces ∩ requested surfaces` (§4.9 "Route").

use std::collections::HashMap;

use super::catalog::DiagnosticSpec;
use super::normalize::NormalizedDiagnostic;
use super::{RawDiagnostic, ResolvedDiagnostic, Severity, Surface};

pub fn route(normalized: NormalizedDiagnostic, spec: &DiagnosticSpec, requested: &[Surface]) -> Option<ResolvedDiagnostic> {
    if matches!(normalized.severity, Severity::Off) {
        return None;
    }
    let surfaces: Vec<Surface> = spec.surfaces.iter().copied().filter(|s| requested.contains(s)).collect();
    if surfaces.is_empty() {
        return None;
    }
    Some(ResolvedDiagnostic {
        code: normalized.raw.code.clone(),
        message: normalized.raw.message.clone(),
        severity: normalized.severity,
        span: normalized.raw.span.clone(),
        data: normalized.raw.data.clone(),
        related: normalized.raw.related.clone(),
        surfaces,
        aur_code: spec.aur_code.map(|s| s.to_string()),
    })
}

/// The facade's grouped-by-surface view (§4.9 "Format" / §7 "User-visible
/// behavior"). `suppressed:true` diagnostics are omitted from every
/// surface here but retained by [`crate::diagnostics::emitter::DiagnosticEmitter::all_for_debug`].
#[derive(Debug, Clone, Default)]
pub struct WorkspaceDiagnostics {
    pub by_surface: HashMap<Surface, Vec<ResolvedDiagnostic>>,
}

impl WorkspaceDiagnostics {
    pub fn insert(&mut self, diagnostic: ResolvedDiagnostic) {
        if matches!(diagnostic.severity, Severity::Suppressed) {
            return;
        }
        for surface in &diagnostic.surfaces {
            self.by_surface.entry(*surface).or_default().push(diagnostic.clone());
        }
    }

    pub fn for_surface(&self, surface: Surface) -> &[ResolvedDiagnostic] {
        self.by_surface.get(&surface).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::catalog;
    use crate::diagnostics::normalize::normalize;

    #[test]
    fn routes_only_requested_surfaces() {
        let spec = catalog::lookup("aurelia/expr-parse-error").unwrap();
        let raw = RawDiagnostic::new("aurelia/expr-parse-error", "bad")
            .with_span(crate::span::SourceSpan::new(crate::span::TextSpan::new(0, 1), None));
        let normalized = normalize(raw).unwrap();
        let resolved = route(normalized, spec, &[Surface::Lsp]).unwrap();
        assert_eq!(resolved.surfaces, vec![Surface::Lsp]);
    }

    #[test]
    fn routes_to_none_when_no_overlap() {
        let spec = catalog::lookup("aurelia/policy/confidence").unwrap();
        let raw = RawDiagnostic::new("aurelia/policy/confidence", "info");
        let normalized = normalize(raw).unwrap();
        assert!(route(normalized, spec, &[Surface::Cli]).is_none());
    }
}
