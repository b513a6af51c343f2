//! The Aurelia template compiler core: HTML+binding-command templates in,
//! a type-checked, provenance-indexed overlay out (§1 "Overview").
//!
//! This crate is library-shaped; `packages/compiler-cli` is the thin CLI
//! adapter that drives [`run_core_pipeline`] against a file on disk.

pub mod depgraph;
pub mod diagnostics;
pub mod error;
pub mod expr;
pub mod identity;
pub mod overlay;
pub mod pipeline;
pub mod project;
pub mod provenance;
pub mod resolve;
pub mod scope;
pub mod span;
pub mod template;
pub mod typecheck;
pub mod workspace;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use error::EngineError;
use pipeline::{Artifact, PipelineOptions, Session, StageKey};
use project::ProjectSemantics;
use resolve::LinkedRow;
use scope::ScopeBindResult;
use template::lower::IrModule;

/// Everything `run_core_pipeline` needs to compile one document: the raw
/// HTML, the project semantics it resolves against, and the handful of
/// knobs `PipelineOptions` exposes. Kept separate from `PipelineOptions`
/// itself so the reference adapter has a stable, serializable input shape
/// independent of the session's internal option struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorePipelineOptions {
    pub html: String,
    pub file: Option<String>,
    pub name: Option<String>,
    pub semantics: ProjectSemantics,
    pub root_vm_type: String,
    pub parser_hint: String,
    pub vm_reflection_hint: String,
}

/// `{ir, linked, scope, typecheck}` (§6 "External Interfaces"): the
/// reference adapter's structured output, run through only the four
/// stages an embedder that doesn't need overlays/AOT cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorePipelineOutput {
    pub ir: Arc<IrModule>,
    pub linked: Arc<Vec<LinkedRow>>,
    pub resolve_diags: Arc<Vec<diagnostics::RawDiagnostic>>,
    pub scope: Arc<ScopeBindResult>,
    pub typecheck: Arc<Vec<diagnostics::RawDiagnostic>>,
}

/// Run `lower → resolve → bind → typecheck` for one document and return
/// their artifacts as plain structured output, the way a thin CLI or an
/// embedder's own request handler would (§6).
pub fn run_core_pipeline(opts: CorePipelineOptions) -> Result<CorePipelineOutput, EngineError> {
    let mut pipeline_options = PipelineOptions::new(opts.html, opts.semantics, opts.root_vm_type);
    pipeline_options.file = opts.file.map(identity::SourceFileId::new);
    pipeline_options.name = opts.name;
    pipeline_options.parser_hint = opts.parser_hint;
    pipeline_options.vm_reflection_hint = opts.vm_reflection_hint;

    let mut session = Session::new(pipeline_options);

    let ir = match session.run(StageKey::Lower)?.artifact {
        Artifact::Lower(module) => module,
        _ => return Err(stage_shape_error(StageKey::Lower)),
    };
    let (linked, resolve_diags) = match session.run(StageKey::Resolve)?.artifact {
        Artifact::Resolve(resolved) => (Arc::new(resolved.rows.clone()), Arc::new(resolved.diags.clone())),
        _ => return Err(stage_shape_error(StageKey::Resolve)),
    };
    let scope = match session.run(StageKey::Bind)?.artifact {
        Artifact::Bind(bound) => bound,
        _ => return Err(stage_shape_error(StageKey::Bind)),
    };
    let typecheck = match session.run(StageKey::Typecheck)?.artifact {
        Artifact::Typecheck(diags) => diags,
        _ => return Err(stage_shape_error(StageKey::Typecheck)),
    };

    Ok(CorePipelineOutput { ir, linked, resolve_diags, scope, typecheck })
}

fn stage_shape_error(key: StageKey) -> EngineError {
    EngineError::StageFailed { stage: key.to_string(), source: anyhow::anyhow!("core pipeline received an unexpected artifact shape") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use project::{RegistrationGraph, ResourceGraph};

    fn empty_semantics() -> ProjectSemantics {
        ProjectSemantics { resources: Vec::new(), registration: RegistrationGraph::default(), graph: ResourceGraph::default(), diags: Vec::new() }
    }

    #[test]
    fn runs_the_four_core_stages_and_returns_their_artifacts() {
        let opts = CorePipelineOptions {
            html: "<div>${name}</div>".to_string(),
            file: Some("/app.html".to_string()),
            name: None,
            semantics: empty_semantics(),
            root_vm_type: "App".to_string(),
            parser_hint: "default".to_string(),
            vm_reflection_hint: "default".to_string(),
        };
        let output = run_core_pipeline(opts).expect("core pipeline should run");
        assert_eq!(output.ir.expr_table.len(), 1);
        assert_eq!(output.linked.len(), output.ir.templates.iter().map(|t| t.rows.len()).sum::<usize>());
        assert!(output.scope.frames.len() >= 1);
    }
}
