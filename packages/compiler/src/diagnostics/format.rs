//! Per-surface formatting (§4.9 "Format").

use super::{ResolvedDiagnostic, Severity, Surface};

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "info",
        Severity::Suppressed => "suppressed",
        Severity::Off => "off",
    }
}

/// A plain, single-line rendering suitable for a CLI/terminal surface.
pub fn format_cli(diagnostic: &ResolvedDiagnostic) -> String {
    let loc = diagnostic
        .span
        .as_ref()
        .map(|s| format!("{}:{}-{}", s.file.as_ref().map(|f| f.as_str()).unwrap_or("<unknown>"), s.span.start, s.span.end))
        .unwrap_or_else(|| "<no-span>".to_string());
    format!("{} [{}] {}: {}", severity_label(diagnostic.severity), diagnostic.code, loc, diagnostic.message)
}

/// The structured shape an LSP transport would serialize into its own
/// `Diagnostic` type: this crate only builds the payload, it does not
/// depend on an LSP crate.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LspDiagnosticPayload {
    pub code: String,
    pub message: String,
    pub severity: &'static str,
    pub start: Option<u32>,
    pub end: Option<u32>,
    pub file: Option<String>,
}

pub fn format_lsp(diagnostic: &ResolvedDiagnostic) -> LspDiagnosticPayload {
    LspDiagnosticPayload {
        code: diagnostic.code.clone(),
        message: diagnostic.message.clone(),
        severity: severity_label(diagnostic.severity),
        start: diagnostic.span.as_ref().map(|s| s.span.start),
        end: diagnostic.span.as_ref().map(|s| s.span.end),
        file: diagnostic.span.as_ref().and_then(|s| s.file.as_ref()).map(|f| f.as_str().to_string()),
    }
}

pub fn format_for_surface(diagnostic: &ResolvedDiagnostic, surface: Surface) -> String {
    match surface {
        Surface::Cli | Surface::Aot | Surface::Debug => format_cli(diagnostic),
        Surface::Lsp => serde_json::to_string(&format_lsp(diagnostic)).unwrap_or_default(),
    }
}
