//! Workspace Facade (C13): the source store, the per-document compilation
//! cache, and the query/refactor operations editor tooling calls (§4.10).

pub mod query;
pub mod refactor;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::diagnostics::emitter::resolve_all;
use crate::diagnostics::policy::DiagnosticPolicy;
use crate::diagnostics::route::WorkspaceDiagnostics;
use crate::diagnostics::{RawDiagnostic, ResolvedDiagnostic, Surface};
use crate::error::EngineError;
use crate::identity::{stable_hash, SourceFileId};
use crate::overlay::{EmitMode, MappingEntry, OverlayPlan, OverlaySource};
use crate::pipeline::{Artifact, AotPlan, PersistentCache, PipelineOptions, Session, StageKey, UsageReport};
use crate::project::ProjectSemantics;
use crate::provenance::{ProvenanceIndex, Uri};
use crate::resolve::{LinkedRow, ResolveOutput};
use crate::scope::ScopeBindResult;
use crate::template::lower::IrModule;

pub use refactor::{RefactorError, RefactorPolicy};

/// One document's fully-compiled state, cached in the workspace keyed by
/// `(uri, optionsFingerprint, contentHash)` (§4.10 "`getCompilation`").
#[derive(Debug, Clone)]
pub struct Compilation {
    pub uri: Uri,
    pub content_hash: String,
    pub options_fingerprint: String,
    pub module: Arc<IrModule>,
    pub semantics: Arc<ProjectSemantics>,
    pub linked_rows: Arc<Vec<LinkedRow>>,
    pub resolve_diags: Arc<Vec<RawDiagnostic>>,
    pub scope: Arc<ScopeBindResult>,
    pub typecheck_diags: Arc<Vec<RawDiagnostic>>,
    pub usage: Arc<UsageReport>,
    pub overlay_plan: Arc<OverlayPlan>,
    pub overlay_source: Arc<OverlaySource>,
    pub aot_plan: Arc<AotPlan>,
    pub mapping: Vec<MappingEntry>,
}

impl Compilation {
    pub fn overlay_uri(&self) -> Uri {
        Uri(format!("{}.__au.ttc.overlay.ts", self.uri.0))
    }
}

struct CacheEntry {
    options_fingerprint: String,
    content_hash: String,
    compilation: Arc<Compilation>,
}

/// Config a workspace compiles every document with. Split out from
/// [`PipelineOptions`] because the workspace owns many documents but shares
/// one project-semantics catalog and one refactor/diagnostic policy across
/// all of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceOptions {
    pub root_vm_type: String,
    pub overlay_mode: EmitMode,
    pub overlay_banner: String,
    pub parser_hint: String,
    pub vm_reflection_hint: String,
    pub requested_surfaces: Vec<Surface>,
    pub diagnostic_policy: DiagnosticPolicy,
    pub refactor_policy: RefactorPolicy,
}

impl Default for WorkspaceOptions {
    fn default() -> Self {
        WorkspaceOptions {
            root_vm_type: "unknown".to_string(),
            overlay_mode: EmitMode::HostTyped,
            overlay_banner: String::new(),
            parser_hint: "default".to_string(),
            vm_reflection_hint: "default".to_string(),
            requested_surfaces: vec![Surface::Lsp],
            diagnostic_policy: DiagnosticPolicy::default(),
            refactor_policy: RefactorPolicy::default(),
        }
    }
}

/// Owns the in-memory source store, the shared provenance index, and the
/// per-document compilation cache. This is the one entry point editor
/// tooling talks to; everything else (pipeline, resolve, scope, overlay) is
/// an implementation detail it drives.
pub struct Workspace {
    documents: HashMap<Uri, String>,
    semantics: ProjectSemantics,
    options: WorkspaceOptions,
    cache: Option<Arc<dyn PersistentCache>>,
    compilations: HashMap<Uri, CacheEntry>,
    provenance: ProvenanceIndex,
}

impl Workspace {
    pub fn new(semantics: ProjectSemantics, options: WorkspaceOptions) -> Self {
        Workspace { documents: HashMap::new(), semantics, options, cache: None, compilations: HashMap::new(), provenance: ProvenanceIndex::new() }
    }

    pub fn with_cache(semantics: ProjectSemantics, options: WorkspaceOptions, cache: Arc<dyn PersistentCache>) -> Self {
        Workspace { documents: HashMap::new(), semantics, options, cache: Some(cache), compilations: HashMap::new(), provenance: ProvenanceIndex::new() }
    }

    pub fn options(&self) -> &WorkspaceOptions {
        &self.options
    }

    pub fn semantics(&self) -> &ProjectSemantics {
        &self.semantics
    }

    pub fn provenance(&self) -> &ProvenanceIndex {
        &self.provenance
    }

    /// Open or overwrite a document's text. Does not itself invalidate a
    /// cached compilation; the next `get_compilation` call observes a
    /// changed `contentHash` and recompiles on its own.
    pub fn open_document(&mut self, uri: Uri, text: impl Into<String>) {
        self.documents.insert(uri, text.into());
    }

    /// Drop a document and every provenance edge touching it, either as
    /// the authored template or as its generated overlay.
    pub fn close_document(&mut self, uri: &Uri) {
        self.documents.remove(uri);
        self.compilations.remove(uri);
        self.provenance.remove_document(uri);
        self.provenance.remove_document(&Uri(format!("{}.__au.ttc.overlay.ts", uri.0)));
    }

    pub fn document_text(&self, uri: &Uri) -> Option<&str> {
        self.documents.get(uri).map(|s| s.as_str())
    }

    fn options_fingerprint(&self) -> String {
        stable_hash(&serde_json::json!({
            "rootVmType": self.options.root_vm_type,
            "vmReflectionHint": self.options.vm_reflection_hint,
            "parserHint": self.options.parser_hint,
            "overlayMode": format!("{:?}", self.options.overlay_mode),
            "overlayBanner": self.options.overlay_banner,
            "semantics": stable_hash(&serde_json::to_value(&self.semantics).unwrap_or_default()),
            "refactorPolicy": stable_hash(&serde_json::to_value(&self.options.refactor_policy).unwrap_or_default()),
        }))
    }

    /// §4.10 `getCompilation`: snapshot → cache lookup → recompile on miss,
    /// feeding the fresh overlay mapping into the shared provenance index.
    pub fn get_compilation(&mut self, uri: &Uri) -> Result<Arc<Compilation>, EngineError> {
        let text = self.documents.get(uri).ok_or(EngineError::MissingOption("document not open in workspace"))?.clone();
        let content_hash = stable_hash(&serde_json::json!({ "text": text }));
        let options_fingerprint = self.options_fingerprint();

        if let Some(entry) = self.compilations.get(uri) {
            if entry.content_hash == content_hash && entry.options_fingerprint == options_fingerprint {
                return Ok(entry.compilation.clone());
            }
        }

        let mut pipeline_options = PipelineOptions::new(text, self.semantics.clone(), self.options.root_vm_type.clone());
        pipeline_options.file = Some(SourceFileId::new(uri.0.clone()));
        pipeline_options.overlay_mode = self.options.overlay_mode;
        pipeline_options.overlay_banner = self.options.overlay_banner.clone();
        pipeline_options.parser_hint = self.options.parser_hint.clone();
        pipeline_options.vm_reflection_hint = self.options.vm_reflection_hint.clone();

        let mut session = match &self.cache {
            Some(cache) => Session::with_cache(pipeline_options, cache.clone()),
            None => Session::new(pipeline_options),
        };

        session.run(StageKey::AotPlan)?;
        session.run(StageKey::Usage)?;

        let module = require_lower(&mut session)?;
        let resolved = require_resolve(&mut session)?;
        let linked_rows = Arc::new(resolved.rows.clone());
        let resolve_diags = Arc::new(resolved.diags.clone());
        let scope = require_bind(&mut session)?;
        let typecheck_diags = require_typecheck(&mut session)?;
        let usage = require_usage(&mut session)?;
        let overlay_plan = require_overlay_plan(&mut session)?;
        let overlay_source = require_overlay_emit(&mut session)?;
        let aot_plan = require_aot_plan(&mut session)?;

        let interp_sources = linked_rows.iter().flat_map(|row| row.instructions.iter().filter_map(|i| i.from.as_ref()));
        let groups = crate::overlay::interpolation_groups_from_sources(interp_sources);
        let mapping = crate::overlay::build_template_mapping(&overlay_source, &groups);

        let compilation = Arc::new(Compilation {
            uri: uri.clone(),
            content_hash: content_hash.clone(),
            options_fingerprint: options_fingerprint.clone(),
            module,
            semantics: Arc::new(self.semantics.clone()),
            linked_rows,
            resolve_diags,
            scope,
            typecheck_diags,
            usage,
            overlay_plan,
            overlay_source,
            aot_plan,
            mapping: mapping.clone(),
        });

        let overlay_uri = compilation.overlay_uri();
        self.provenance.remove_document(uri);
        self.provenance.remove_document(&overlay_uri);
        self.provenance.insert_mapping(uri, &overlay_uri, &mapping);

        self.compilations.insert(uri.clone(), CacheEntry { options_fingerprint, content_hash, compilation: compilation.clone() });
        Ok(compilation)
    }

    /// Gather every raw diagnostic this document's last compilation
    /// produced (lowering, resolve, typecheck, project discovery) and run
    /// them through the full normalize→demote→policy→route pipeline.
    pub fn diagnostics(&mut self, uri: &Uri) -> Result<(WorkspaceDiagnostics, Vec<ResolvedDiagnostic>), EngineError> {
        let compilation = self.get_compilation(uri)?;
        let mut raws = Vec::new();
        raws.extend(compilation.module.diags.iter().cloned());
        raws.extend(self.semantics.diags.iter().cloned());
        raws.extend(compilation.resolve_diags.iter().cloned());
        raws.extend(compilation.typecheck_diags.iter().cloned());
        raws.extend(compilation.usage.diags.iter().cloned());
        Ok(resolve_all(raws, &self.options.diagnostic_policy, &self.options.requested_surfaces, "workspace"))
    }
}

fn require_lower(session: &mut Session) -> Result<Arc<IrModule>, EngineError> {
    match session.run(StageKey::Lower)?.artifact {
        Artifact::Lower(module) => Ok(module),
        _ => Err(shape_error(StageKey::Lower)),
    }
}

fn require_resolve(session: &mut Session) -> Result<Arc<ResolveOutput>, EngineError> {
    match session.run(StageKey::Resolve)?.artifact {
        Artifact::Resolve(resolved) => Ok(resolved),
        _ => Err(shape_error(StageKey::Resolve)),
    }
}

fn require_bind(session: &mut Session) -> Result<Arc<ScopeBindResult>, EngineError> {
    match session.run(StageKey::Bind)?.artifact {
        Artifact::Bind(scope) => Ok(scope),
        _ => Err(shape_error(StageKey::Bind)),
    }
}

fn require_typecheck(session: &mut Session) -> Result<Arc<Vec<RawDiagnostic>>, EngineError> {
    match session.run(StageKey::Typecheck)?.artifact {
        Artifact::Typecheck(diags) => Ok(diags),
        _ => Err(shape_error(StageKey::Typecheck)),
    }
}

fn require_usage(session: &mut Session) -> Result<Arc<UsageReport>, EngineError> {
    match session.run(StageKey::Usage)?.artifact {
        Artifact::Usage(report) => Ok(report),
        _ => Err(shape_error(StageKey::Usage)),
    }
}

fn require_overlay_plan(session: &mut Session) -> Result<Arc<OverlayPlan>, EngineError> {
    match session.run(StageKey::OverlayPlan)?.artifact {
        Artifact::OverlayPlan(plan) => Ok(plan),
        _ => Err(shape_error(StageKey::OverlayPlan)),
    }
}

fn require_overlay_emit(session: &mut Session) -> Result<Arc<OverlaySource>, EngineError> {
    match session.run(StageKey::OverlayEmit)?.artifact {
        Artifact::OverlayEmit(source) => Ok(source),
        _ => Err(shape_error(StageKey::OverlayEmit)),
    }
}

fn require_aot_plan(session: &mut Session) -> Result<Arc<AotPlan>, EngineError> {
    match session.run(StageKey::AotPlan)?.artifact {
        Artifact::AotPlan(plan) => Ok(plan),
        _ => Err(shape_error(StageKey::AotPlan)),
    }
}

fn shape_error(key: StageKey) -> EngineError {
    EngineError::StageFailed { stage: key.to_string(), source: anyhow::anyhow!("workspace received an unexpected artifact shape") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{RegistrationGraph, ResourceGraph};

    fn empty_semantics() -> ProjectSemantics {
        ProjectSemantics { resources: Vec::new(), registration: RegistrationGraph::default(), graph: ResourceGraph::default(), diags: Vec::new() }
    }

    #[test]
    fn compiling_twice_without_edits_reuses_the_cached_compilation() {
        let mut workspace = Workspace::new(empty_semantics(), WorkspaceOptions::default());
        let uri = Uri("/app.html".to_string());
        workspace.open_document(uri.clone(), "<div>${name}</div>");
        let first = workspace.get_compilation(&uri).expect("first compile");
        let second = workspace.get_compilation(&uri).expect("second compile");
        assert_eq!(first.content_hash, second.content_hash);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn editing_a_document_invalidates_its_cached_compilation() {
        let mut workspace = Workspace::new(empty_semantics(), WorkspaceOptions::default());
        let uri = Uri("/app.html".to_string());
        workspace.open_document(uri.clone(), "<div>${name}</div>");
        let first = workspace.get_compilation(&uri).expect("first compile");
        workspace.open_document(uri.clone(), "<div>${other}</div>");
        let second = workspace.get_compilation(&uri).expect("second compile");
        assert_ne!(first.content_hash, second.content_hash);
    }

    #[test]
    fn closing_a_document_drops_its_provenance_edges() {
        let mut workspace = Workspace::new(empty_semantics(), WorkspaceOptions::default());
        let uri = Uri("/app.html".to_string());
        // "name" occupies html offsets [7, 11) in `<div>${name}</div>`.
        workspace.open_document(uri.clone(), "<div>${name}</div>");
        workspace.get_compilation(&uri).expect("compile");
        assert!(!workspace.provenance().find_by_source(&uri, 8).is_empty());
        workspace.close_document(&uri);
        assert!(workspace.provenance().find_by_source(&uri, 8).is_empty());
    }

    #[test]
    fn diagnostics_delegates_to_the_catalog_pipeline() {
        let mut workspace = Workspace::new(empty_semantics(), WorkspaceOptions::default());
        let uri = Uri("/app.html".to_string());
        workspace.open_document(uri.clone(), r#"<div foo.for="x"></div>"#);
        let (_, debug_all) = workspace.diagnostics(&uri).expect("diagnostics");
        assert!(debug_all.iter().any(|d| d.code == "aurelia/invalid-command-usage"));
    }
}
