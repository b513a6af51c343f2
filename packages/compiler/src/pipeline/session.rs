//! `Session` (§4.1): binds `PipelineOptions`, memoizes stage results, and
//! implements the five-step `run(k)` algorithm.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::diagnostics::RawDiagnostic;
use crate::error::EngineError;
use crate::identity::{stable_hash, SourceFileId};
use crate::overlay::{self, EmitMode, OverlayPlan, OverlaySource};
use crate::project::ProjectSemantics;
use crate::resolve::{self, LinkedRow, ResolveOutput, TargetSem};
use crate::scope::{self, ScopeBindResult};
use crate::template::instruction::BindingSource;
use crate::template::lower::{lower_template, IrModule, LowerOptions};
use crate::typecheck;

use super::cache::{CacheBlob, CacheLock, CacheMeta, PersistentCache};
use super::stage::StageKey;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub html: String,
    pub file: Option<SourceFileId>,
    pub name: Option<String>,
    pub semantics: ProjectSemantics,
    pub root_vm_type: String,
    pub overlay_mode: EmitMode,
    pub overlay_banner: String,
    /// Opaque upstream inputs (HTML parser, expression parser, VM
    /// reflection token) represented by a caller-supplied hint string
    /// rather than hashed directly, per §4.1 "Fingerprinting rules".
    pub parser_hint: String,
    pub vm_reflection_hint: String,
}

impl PipelineOptions {
    pub fn new(html: impl Into<String>, semantics: ProjectSemantics, root_vm_type: impl Into<String>) -> Self {
        PipelineOptions {
            html: html.into(),
            file: None,
            name: None,
            semantics,
            root_vm_type: root_vm_type.into(),
            overlay_mode: EmitMode::HostTyped,
            overlay_banner: String::new(),
            parser_hint: "default".to_string(),
            vm_reflection_hint: "default".to_string(),
        }
    }
}

/// One stage's typed output. A closed sum mirroring `StageKey`, so every
/// consumer match is exhaustive and adding a ninth stage is a compile error
/// everywhere this enum is matched (§9 "any-case fall-throughs are
/// forbidden").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "stage", content = "data")]
pub enum Artifact {
    Lower(Arc<IrModule>),
    Resolve(Arc<ResolveOutput>),
    Bind(Arc<ScopeBindResult>),
    Typecheck(Arc<Vec<RawDiagnostic>>),
    Usage(Arc<UsageReport>),
    OverlayPlan(Arc<OverlayPlan>),
    OverlayEmit(Arc<OverlaySource>),
    AotPlan(Arc<AotPlan>),
}

impl Artifact {
    fn stage_key(&self) -> StageKey {
        match self {
            Artifact::Lower(_) => StageKey::Lower,
            Artifact::Resolve(_) => StageKey::Resolve,
            Artifact::Bind(_) => StageKey::Bind,
            Artifact::Typecheck(_) => StageKey::Typecheck,
            Artifact::Usage(_) => StageKey::Usage,
            Artifact::OverlayPlan(_) => StageKey::OverlayPlan,
            Artifact::OverlayEmit(_) => StageKey::OverlayEmit,
            Artifact::AotPlan(_) => StageKey::AotPlan,
        }
    }
}

/// Which resources and bindables a template actually references, fed to the
/// dependency graph so edits to an unreferenced resource never mark the
/// template affected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageReport {
    pub referenced_resources: Vec<String>,
    pub unknown_target_count: usize,
    pub diags: Vec<RawDiagnostic>,
}

/// Whether a template is eligible for ahead-of-time compilation: no
/// type-check errors and no unresolved (`Unknown`) overlay member segments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AotPlan {
    pub eligible: bool,
    pub blocking_diagnostic_count: usize,
    pub overlay_byte_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageSource {
    Cache,
    Run,
    Seed,
}

#[derive(Debug, Clone)]
pub struct StageRecord {
    pub key: StageKey,
    pub version: String,
    pub cache_key: String,
    pub artifact_hash: String,
    pub from_cache: bool,
    pub source: StageSource,
    pub artifact: Artifact,
}

pub struct Session {
    options: PipelineOptions,
    memo: HashMap<StageKey, StageRecord>,
    cache: Option<Arc<dyn PersistentCache>>,
    lock: CacheLock,
}

impl Session {
    pub fn new(options: PipelineOptions) -> Self {
        Session { options, memo: HashMap::new(), cache: None, lock: CacheLock::new() }
    }

    pub fn with_cache(options: PipelineOptions, cache: Arc<dyn PersistentCache>) -> Self {
        Session { options, memo: HashMap::new(), cache: Some(cache), lock: CacheLock::new() }
    }

    /// Register a caller-provided artifact directly into the memo, skipping
    /// `run`'s cache/compute path. Recorded with `source = Seed`.
    pub fn seed(&mut self, artifact: Artifact) {
        let key = artifact.stage_key();
        let version = key.version().to_string();
        let artifact_hash = artifact_hash(&artifact);
        self.memo.insert(
            key,
            StageRecord { key, version, cache_key: String::new(), artifact_hash, from_cache: false, source: StageSource::Seed, artifact },
        );
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    #[instrument(skip(self), fields(stage = %key))]
    pub fn run(&mut self, key: StageKey) -> Result<StageRecord, EngineError> {
        if let Some(record) = self.memo.get(&key) {
            trace!("stage already memoized this session");
            return Ok(record.clone());
        }

        let mut dep_summaries = Vec::new();
        for dep in key.deps() {
            let record = self.run(*dep)?;
            dep_summaries.push(serde_json::json!({
                "key": dep.as_str(),
                "version": record.version,
                "artifactHash": record.artifact_hash,
            }));
        }

        let fingerprint = self.fingerprint(key);
        let cache_key = stable_hash(&serde_json::json!({
            "key": key.as_str(),
            "version": key.version(),
            "deps": dep_summaries,
            "fingerprint": fingerprint,
        }));

        if let Some(cache) = self.cache.clone() {
            if self.lock.acquire(CacheLock::DEFAULT_POLL_ATTEMPTS) {
                if let Some(blob) = cache.get(&cache_key, key.version()) {
                    let artifact = deserialize_artifact(key, &blob.artifact)?;
                    debug!(cache_key, "stage served from persistent cache");
                    let record = StageRecord {
                        key,
                        version: key.version().to_string(),
                        cache_key,
                        artifact_hash: blob.meta.artifact_hash,
                        from_cache: true,
                        source: StageSource::Cache,
                        artifact,
                    };
                    self.memo.insert(key, record.clone());
                    return Ok(record);
                }
            }
        }

        let artifact = self.run_uncached(key)?;
        let artifact_hash = artifact_hash(&artifact);

        if let Some(cache) = &self.cache {
            let payload = serde_json::to_value(&artifact).unwrap_or(serde_json::Value::Null);
            cache.put(&cache_key, CacheBlob { meta: CacheMeta { version: key.version().to_string(), artifact_hash: artifact_hash.clone() }, artifact: payload });
        }

        let record = StageRecord { key, version: key.version().to_string(), cache_key, artifact_hash, from_cache: false, source: StageSource::Run, artifact };
        self.memo.insert(key, record.clone());
        Ok(record)
    }

    /// A pure function of authored inputs only (§4.1 "Fingerprinting
    /// rules"): the HTML text, the file/name identity, the VM type, the
    /// overlay mode, and opaque-input hints. Deliberately excludes anything
    /// already covered by a dependency's own `artifactHash`.
    fn fingerprint(&self, key: StageKey) -> String {
        let opts = &self.options;
        let payload = match key {
            StageKey::Lower => serde_json::json!({
                "html": opts.html,
                "file": opts.file.as_ref().map(|f| f.as_str()),
                "name": opts.name,
                "parserHint": opts.parser_hint,
            }),
            StageKey::Resolve => serde_json::json!({ "semantics": stable_hash(&serde_json::to_value(&opts.semantics).unwrap_or_default()) }),
            StageKey::Bind => serde_json::json!({ "rootVmType": opts.root_vm_type, "vmReflectionHint": opts.vm_reflection_hint }),
            StageKey::Typecheck => serde_json::json!({ "file": opts.file.as_ref().map(|f| f.as_str()) }),
            StageKey::Usage => serde_json::json!({}),
            StageKey::OverlayPlan => serde_json::json!({ "rootVmType": opts.root_vm_type }),
            StageKey::OverlayEmit => serde_json::json!({ "overlayMode": format!("{:?}", opts.overlay_mode), "banner": opts.overlay_banner }),
            StageKey::AotPlan => serde_json::json!({}),
        };
        stable_hash(&payload)
    }

    fn dep_artifact(&self, key: StageKey) -> Artifact {
        self.memo.get(&key).expect("dependency must already be memoized by run()").artifact.clone()
    }

    fn run_uncached(&mut self, key: StageKey) -> Result<Artifact, EngineError> {
        match key {
            StageKey::Lower => {
                let opts = LowerOptions { file: self.options.file.clone(), name: self.options.name.clone() };
                let module = lower_template(&self.options.html, opts);
                Ok(Artifact::Lower(Arc::new(module)))
            }
            StageKey::Resolve => {
                let Artifact::Lower(module) = self.dep_artifact(StageKey::Lower) else {
                    return Err(stage_shape_error(StageKey::Resolve));
                };
                let mut diags = Vec::new();
                let mut rows = Vec::new();
                for template in &module.templates {
                    for row in &template.rows {
                        let host_node = template.dom.find(&row.target);
                        let host_tag = host_node.and_then(element_tag);
                        let host_span = host_node.and_then(element_tag_loc);
                        rows.push(resolve::resolve_row(row, &self.options.semantics, host_tag, host_span, self.options.file.as_ref(), &mut diags));
                    }
                }
                Ok(Artifact::Resolve(Arc::new(ResolveOutput { rows, diags })))
            }
            StageKey::Bind => {
                let Artifact::Lower(module) = self.dep_artifact(StageKey::Lower) else {
                    return Err(stage_shape_error(StageKey::Bind));
                };
                let scope = scope::bind(&module, &self.options.root_vm_type);
                Ok(Artifact::Bind(Arc::new(scope)))
            }
            StageKey::Typecheck => {
                let (Artifact::Resolve(resolved), Artifact::Bind(scope)) = (self.dep_artifact(StageKey::Resolve), self.dep_artifact(StageKey::Bind)) else {
                    return Err(stage_shape_error(StageKey::Typecheck));
                };
                let lower_record = self.memo.get(&StageKey::Lower).expect("lower runs before typecheck");
                let Artifact::Lower(module) = &lower_record.artifact else { return Err(stage_shape_error(StageKey::Typecheck)) };
                let diags = typecheck::check(module, &resolved.rows, &scope, self.options.file.as_ref());
                Ok(Artifact::Typecheck(Arc::new(diags)))
            }
            StageKey::Usage => {
                let Artifact::Resolve(resolved) = self.dep_artifact(StageKey::Resolve) else {
                    return Err(stage_shape_error(StageKey::Usage));
                };
                Ok(Artifact::Usage(Arc::new(usage_report(&resolved.rows, &self.options.semantics))))
            }
            StageKey::OverlayPlan => {
                let lower_record = self.memo.get(&StageKey::Lower).expect("lower runs before overlay:plan");
                let Artifact::Lower(module) = lower_record.artifact.clone() else { return Err(stage_shape_error(StageKey::OverlayPlan)) };
                let Artifact::Bind(scope) = self.dep_artifact(StageKey::Bind) else { return Err(stage_shape_error(StageKey::OverlayPlan)) };
                let plan = overlay::plan(&module, &scope);
                Ok(Artifact::OverlayPlan(Arc::new(plan)))
            }
            StageKey::OverlayEmit => {
                let lower_record = self.memo.get(&StageKey::Lower).expect("lower runs before overlay:emit");
                let Artifact::Lower(module) = lower_record.artifact.clone() else { return Err(stage_shape_error(StageKey::OverlayEmit)) };
                let Artifact::OverlayPlan(plan) = self.dep_artifact(StageKey::OverlayPlan) else { return Err(stage_shape_error(StageKey::OverlayEmit)) };
                let source = overlay::emit(&module, &plan, self.options.overlay_mode, &self.options.overlay_banner);
                Ok(Artifact::OverlayEmit(Arc::new(source)))
            }
            StageKey::AotPlan => {
                let Artifact::OverlayEmit(source) = self.dep_artifact(StageKey::OverlayEmit) else {
                    return Err(stage_shape_error(StageKey::AotPlan));
                };
                let Artifact::Typecheck(diags) = self.dep_artifact(StageKey::Typecheck) else {
                    return Err(stage_shape_error(StageKey::AotPlan));
                };
                let blocking = diags.iter().filter(|d| !d.recovery).count();
                let plan = AotPlan { eligible: blocking == 0, blocking_diagnostic_count: blocking, overlay_byte_len: source.text.len() };
                Ok(Artifact::AotPlan(Arc::new(plan)))
            }
        }
    }
}

fn element_tag(node: &crate::template::dom::DomNode) -> Option<&str> {
    match node {
        crate::template::dom::DomNode::Element { tag, .. } => Some(tag.as_str()),
        _ => None,
    }
}

fn element_tag_loc(node: &crate::template::dom::DomNode) -> Option<crate::span::TextSpan> {
    match node {
        crate::template::dom::DomNode::Element { tag_loc, .. } => Some(*tag_loc),
        _ => None,
    }
}

fn usage_report(rows: &[LinkedRow], semantics: &ProjectSemantics) -> UsageReport {
    let mut referenced = std::collections::BTreeSet::new();
    let mut unknown = 0;
    for row in rows {
        for instr in &row.instructions {
            match &instr.target {
                TargetSem::ElementBindable { resource, .. }
                | TargetSem::AttributeBindable { resource, .. }
                | TargetSem::ControllerProp { resource, .. } => {
                    referenced.insert(resource.clone());
                }
                TargetSem::Unknown => unknown += 1,
                TargetSem::ElementNativeProp { .. } | TargetSem::Style { .. } => {}
            }
            if let Some(BindingSource::Interp { exprs, .. }) = &instr.from {
                let _ = exprs; // interpolation segments don't themselves name a resource
            }
        }
    }

    // Every custom element the host project declares but this document
    // never instantiates is informational, not an error: orphaned in this
    // document alone, not necessarily dead across the whole project.
    let mut diags = Vec::new();
    for resource in &semantics.resources {
        if resource.kind == "custom-element" && !referenced.contains(&resource.name) {
            diags.push(RawDiagnostic::new(
                "aurelia/project/orphan-element",
                format!("custom element `{}` is declared but never used in this document", resource.name),
            ));
        }
    }

    UsageReport { referenced_resources: referenced.into_iter().collect(), unknown_target_count: unknown, diags }
}

fn artifact_hash(artifact: &Artifact) -> String {
    let value = serde_json::to_value(artifact).unwrap_or(serde_json::Value::Null);
    stable_hash(&value)
}

fn stage_shape_error(key: StageKey) -> EngineError {
    EngineError::StageFailed { stage: key.to_string(), source: anyhow::anyhow!("dependency artifact had an unexpected shape") }
}

fn deserialize_artifact(key: StageKey, value: &serde_json::Value) -> Result<Artifact, EngineError> {
    serde_json::from_value(value.clone()).map_err(|e| EngineError::StageFailed { stage: key.to_string(), source: anyhow::Error::new(e) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{RegistrationGraph, ResourceGraph};

    fn empty_semantics() -> ProjectSemantics {
        ProjectSemantics { resources: Vec::new(), registration: RegistrationGraph::default(), graph: ResourceGraph::default(), diags: Vec::new() }
    }

    #[test]
    fn running_aot_plan_transitively_runs_every_dependency() {
        let options = PipelineOptions::new("<div>${name}</div>", empty_semantics(), "App");
        let mut session = Session::new(options);
        let record = session.run(StageKey::AotPlan).expect("aot:plan should succeed");
        assert_eq!(record.source, StageSource::Run);
        for dep in [StageKey::Lower, StageKey::Resolve, StageKey::Bind, StageKey::Typecheck, StageKey::OverlayPlan, StageKey::OverlayEmit] {
            assert!(session.memo.contains_key(&dep), "{:?} should have run as a transitive dependency", dep);
        }
    }

    #[test]
    fn second_run_in_same_session_is_memoized_not_recomputed() {
        let options = PipelineOptions::new("<div>${name}</div>", empty_semantics(), "App");
        let mut session = Session::new(options);
        let first = session.run(StageKey::Lower).expect("first run");
        let second = session.run(StageKey::Lower).expect("second run");
        assert_eq!(first.cache_key, second.cache_key);
        assert_eq!(first.artifact_hash, second.artifact_hash);
    }

    #[test]
    fn persistent_cache_is_reused_across_sessions() {
        use super::super::cache::InMemoryCache;
        let cache: Arc<dyn PersistentCache> = Arc::new(InMemoryCache::new());

        let options_a = PipelineOptions::new("<div>${name}</div>", empty_semantics(), "App");
        let mut session_a = Session::with_cache(options_a, cache.clone());
        let first = session_a.run(StageKey::Lower).expect("first session run");
        assert_eq!(first.source, StageSource::Run);

        let options_b = PipelineOptions::new("<div>${name}</div>", empty_semantics(), "App");
        let mut session_b = Session::with_cache(options_b, cache);
        let second = session_b.run(StageKey::Lower).expect("second session run");
        assert_eq!(second.source, StageSource::Cache);
        assert_eq!(first.artifact_hash, second.artifact_hash);
    }

    #[test]
    fn option_fingerprint_change_misses_cache() {
        use super::super::cache::InMemoryCache;
        let cache: Arc<dyn PersistentCache> = Arc::new(InMemoryCache::new());

        let options_a = PipelineOptions::new("<div>${name}</div>", empty_semantics(), "App");
        let mut session_a = Session::with_cache(options_a, cache.clone());
        session_a.run(StageKey::Lower).unwrap();

        let options_b = PipelineOptions::new("<div>${other}</div>", empty_semantics(), "App");
        let mut session_b = Session::with_cache(options_b, cache);
        let record = session_b.run(StageKey::Lower).unwrap();
        assert_eq!(record.source, StageSource::Run);
    }

    #[test]
    fn seeded_artifact_is_recorded_without_running() {
        let options = PipelineOptions::new("<div>${name}</div>", empty_semantics(), "App");
        let mut session = Session::new(options);
        let module = lower_template(&session.options.html.clone(), LowerOptions::default());
        session.seed(Artifact::Lower(Arc::new(module)));
        let record = session.run(StageKey::Lower).expect("seeded stage should short-circuit");
        assert_eq!(record.source, StageSource::Seed);
    }
}
