//! Per-stage diagnostic emitter. Each compiler stage owns one, bound to its
//! stage tag, and collects diagnostics module-wide instead of throwing
//! (§7 "Propagation").

use tracing::trace;

use super::normalize::normalize;
use super::policy::{apply_policy, DiagnosticPolicy};
use super::route::{route, WorkspaceDiagnostics};
use super::{catalog, RawDiagnostic, ResolvedDiagnostic, Surface};

#[derive(Debug, Default)]
pub struct DiagnosticEmitter {
    stage: String,
    collected: Vec<RawDiagnostic>,
}

impl DiagnosticEmitter {
    pub fn new(stage: impl Into<String>) -> Self {
        DiagnosticEmitter { stage: stage.into(), collected: Vec::new() }
    }

    pub fn emit(&mut self, diagnostic: RawDiagnostic) {
        trace!(stage = %self.stage, code = %diagnostic.code, "diagnostic emitted");
        self.collected.push(diagnostic);
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn into_raw(self) -> Vec<RawDiagnostic> {
        self.collected
    }

    pub fn raw(&self) -> &[RawDiagnostic] {
        &self.collected
    }
}

/// Run every raw diagnostic collected module-wide through
/// normalize → demote → policy → route, producing both the routed
/// [`WorkspaceDiagnostics`] and the full debug list (including suppressed
/// entries, per §7 "User-visible behavior").
pub fn resolve_all(raws: Vec<RawDiagnostic>, policy: &DiagnosticPolicy, requested_surfaces: &[Surface], surface_key: &str) -> (WorkspaceDiagnostics, Vec<ResolvedDiagnostic>) {
    let mut workspace = WorkspaceDiagnostics::default();
    let mut debug_all = Vec::new();

    for raw in raws {
        let code = raw.code.clone();
        let Ok(normalized) = normalize(raw) else { continue };
        let Some(spec) = catalog::lookup(&code) else { continue };
        let demoted = super::demote::demote(normalized, spec);
        let resolved = apply_policy(demoted, spec, policy, surface_key);

        // Build a debug-surface entry regardless of routing so suppressed
        // diagnostics remain visible to the debug pipeline output.
        let debug_surfaces: Vec<Surface> = spec.surfaces.iter().copied().collect();
        debug_all.push(ResolvedDiagnostic {
            code: resolved.raw.code.clone(),
            message: resolved.raw.message.clone(),
            severity: resolved.severity,
            span: resolved.raw.span.clone(),
            data: resolved.raw.data.clone(),
            related: resolved.raw.related.clone(),
            surfaces: debug_surfaces,
            aur_code: spec.aur_code.map(|s| s.to_string()),
        });

        if let Some(routed) = route(resolved, spec, requested_surfaces) {
            workspace.insert(routed);
        }
    }

    (workspace, debug_all)
}
