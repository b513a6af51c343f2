//! End-to-end scenarios against the public API: one template in, its
//! compiled artifacts out, exercised the way an embedder would rather than
//! through any single stage's internals.

use std::sync::Arc;

use aurelia_compiler::diagnostics::emitter::resolve_all;
use aurelia_compiler::diagnostics::policy::DiagnosticPolicy;
use aurelia_compiler::diagnostics::{Confidence, RawDiagnostic, Severity, Surface};
use aurelia_compiler::identity::ExprId;
use aurelia_compiler::overlay::{build_template_mapping, interpolation_groups_from_sources, EmitMode};
use aurelia_compiler::pipeline::{Artifact, InMemoryCache, PipelineOptions, Session, StageKey};
use aurelia_compiler::project::{ProjectSemantics, RegistrationGraph, ResourceGraph};
use aurelia_compiler::provenance::Uri;
use aurelia_compiler::resolve::TargetSem;
use aurelia_compiler::span::TextSpan;
use aurelia_compiler::template::instruction::{ExpressionType, Instruction};
use aurelia_compiler::workspace::{RefactorPolicy, Workspace, WorkspaceOptions};

fn empty_semantics() -> ProjectSemantics {
    ProjectSemantics { resources: Vec::new(), registration: RegistrationGraph::default(), graph: ResourceGraph::default(), diags: Vec::new() }
}

fn compile(html: &str, root_vm_type: &str) -> Session {
    let options = PipelineOptions::new(html.to_string(), empty_semantics(), root_vm_type.to_string());
    let mut session = Session::new(options);
    session.run(StageKey::AotPlan).unwrap();
    session
}

fn artifact_lower(session: &mut Session) -> Arc<aurelia_compiler::template::lower::IrModule> {
    match session.run(StageKey::Lower).unwrap().artifact {
        Artifact::Lower(m) => m,
        other => panic!("expected Lower artifact, got {:?}", other),
    }
}

fn artifact_resolve(session: &mut Session) -> Arc<aurelia_compiler::resolve::ResolveOutput> {
    match session.run(StageKey::Resolve).unwrap().artifact {
        Artifact::Resolve(r) => r,
        other => panic!("expected Resolve artifact, got {:?}", other),
    }
}

#[test]
fn s1_simple_interpolation() {
    let mut session = compile("<div>${name}</div>", "App");
    let module = artifact_lower(&mut session);
    assert_eq!(module.templates.len(), 1);
    assert_eq!(module.expr_table.len(), 1);
    assert_eq!(module.expr_table[0].expression_type, ExpressionType::Interp);

    let root = module.template(&module.root).unwrap();
    let text_row = root.rows.iter().find(|r| matches!(r.instructions.first(), Some(Instruction::TextBinding { .. }))).expect("a text binding row");
    match &text_row.instructions[0] {
        Instruction::TextBinding { from } => match from {
            aurelia_compiler::template::instruction::BindingSource::Interp { parts, exprs } => {
                assert_eq!(parts, &vec!["".to_string(), "".to_string()]);
                assert_eq!(exprs.len(), 1);
            }
            other => panic!("expected an interpolation source, got {:?}", other),
        },
        other => panic!("unexpected instruction {:?}", other),
    }

    let plan = aurelia_compiler::overlay::plan(&module, &match session.run(StageKey::Bind).unwrap().artifact {
        Artifact::Bind(s) => s,
        other => panic!("expected Bind artifact, got {:?}", other),
    });
    let overlay = aurelia_compiler::overlay::emit(&module, &plan, EmitMode::HostTyped, "");
    let call_lines: Vec<&str> = overlay.text.lines().filter(|l| l.contains("__au$access")).collect();
    assert_eq!(call_lines.len(), 1);
    assert!(call_lines[0].contains("o.name"));

    let groups = interpolation_groups_from_sources(std::iter::empty::<&aurelia_compiler::template::instruction::BindingSource>());
    let mapping = build_template_mapping(&overlay, &groups);
    assert_eq!(mapping.len(), 1);
    assert_eq!(mapping[0].html_span.slice("<div>${name}</div>"), "name");
}

#[test]
fn s2_repeat_controller_with_inner_binding() {
    let html = r#"<div repeat.for="item of items"><span title.bind="item.name">${item.name}</span></div>"#;
    let mut session = compile(html, "App");
    let module = artifact_lower(&mut session);
    assert_eq!(module.templates.len(), 2);

    let root = module.template(&module.root).unwrap();
    let controller_row = root.rows.iter().find(|r| matches!(r.instructions.first(), Some(Instruction::HydrateTemplateController { .. }))).expect("a controller row");
    let inner_template_id = match &controller_row.instructions[0] {
        Instruction::HydrateTemplateController { res, def, .. } => {
            assert_eq!(res, "repeat");
            def.clone()
        }
        other => panic!("unexpected {:?}", other),
    };
    let inner = module.template(&inner_template_id).expect("the inner repeat template");
    assert!(inner.rows.iter().any(|r| r.instructions.iter().any(|i| matches!(i, Instruction::PropertyBinding { to, .. } if to == "title"))));
    assert!(inner.rows.iter().any(|r| r.instructions.iter().any(|i| matches!(i, Instruction::TextBinding { .. }))));

    let resolved = artifact_resolve(&mut session);
    assert!(resolved.rows.iter().any(|row| row.instructions.iter().any(|i| matches!(&i.target, TargetSem::ElementNativeProp { prop } if prop == "title"))));
    assert!(resolved.rows.iter().any(|row| row.instructions.iter().any(|i| matches!(&i.target, TargetSem::ElementNativeProp { prop } if prop == "textContent"))));

    let scope = match session.run(StageKey::Bind).unwrap().artifact {
        Artifact::Bind(s) => s,
        other => panic!("expected Bind artifact, got {:?}", other),
    };
    let repeat_frame = scope.frames.iter().find(|f| f.locals.contains_key("item")).expect("a repeat frame binding `item`");
    let inner_expr_ids: Vec<ExprId> = inner.rows.iter().flat_map(|r| r.instructions.iter()).filter_map(|i| match i {
        Instruction::PropertyBinding { from: aurelia_compiler::template::instruction::BindingSource::ExprRef(r), .. } => Some(r.id),
        Instruction::TextBinding { from: aurelia_compiler::template::instruction::BindingSource::Interp { exprs, .. } } => exprs.first().map(|e| e.id),
        _ => None,
    }).collect();
    assert!(!inner_expr_ids.is_empty());
    for id in inner_expr_ids {
        assert_eq!(scope.expr_frame.get(&id).copied(), Some(repeat_frame.id));
    }
}

#[test]
fn s3_policy_denied_rename_leaves_workspace_untouched() {
    use aurelia_compiler::project::canonical::CanonicalSourceId;
    use aurelia_compiler::project::{Bindable, ResourceDef};

    let semantics = ProjectSemantics {
        resources: vec![ResourceDef {
            id: CanonicalSourceId::new("project-discovery", None, "/my-element.ts", "MyElement", "custom-element", "my-element", None, None),
            kind: "custom-element".to_string(),
            name: "my-element".to_string(),
            class_name: "MyElement".to_string(),
            containerless: false,
            bindables: Vec::new(),
            sibling_template: None,
        }],
        registration: RegistrationGraph::default(),
        graph: ResourceGraph::default(),
        diags: Vec::new(),
    };

    let mut options = WorkspaceOptions::default();
    options.overlay_mode = EmitMode::HostTyped;
    let mut policy = RefactorPolicy::default();
    policy.rename.allowed_targets = vec!["resource".to_string()];
    options.refactor_policy = policy.clone();

    let mut ws = Workspace::new(semantics, options);
    let uri = Uri("/app.html".to_string());
    let html = "<my-element></my-element>";
    ws.open_document(uri.clone(), html);

    let comp = ws.get_compilation(&uri).unwrap();
    let err = aurelia_compiler::workspace::refactor::rename(&comp, &policy, 1, "your-element").unwrap_err();
    assert_eq!(err.kind, "refactor-decision-required");
    assert!(!err.retryable);
    assert_eq!(ws.document_text(&uri).unwrap(), html);
}

#[test]
fn s4_cross_expression_interpolation_merging() {
    let html = "${person.name} and ${person.age}";
    let mut session = compile(html, "App");
    let module = artifact_lower(&mut session);
    let scope = match session.run(StageKey::Bind).unwrap().artifact {
        Artifact::Bind(s) => s,
        other => panic!("expected Bind artifact, got {:?}", other),
    };
    let plan = aurelia_compiler::overlay::plan(&module, &scope);
    let overlay = aurelia_compiler::overlay::emit(&module, &plan, EmitMode::HostTyped, "");

    let root = module.template(&module.root).unwrap();
    let mut interp_sources = Vec::new();
    for row in &root.rows {
        for instr in &row.instructions {
            if let Instruction::TextBinding { from } = instr {
                interp_sources.push(from.clone());
            }
        }
    }
    let groups = interpolation_groups_from_sources(interp_sources.iter());
    let mapping = build_template_mapping(&overlay, &groups);

    let mut retained: Vec<&str> = mapping.iter().map(|e| e.html_span.slice(html)).collect();
    retained.sort();
    assert_eq!(retained, vec!["person.age", "person.name"]);
}

#[test]
fn s5_cache_hit_reuse() {
    let cache = Arc::new(InMemoryCache::new());
    let html = "<div>${name}</div>".to_string();

    let options1 = PipelineOptions::new(html.clone(), empty_semantics(), "App".to_string());
    let mut session1 = Session::with_cache(options1, cache.clone());
    let first = session1.run(StageKey::Typecheck).unwrap();
    assert!(!first.from_cache);

    let options2 = PipelineOptions::new(html, empty_semantics(), "App".to_string());
    let mut session2 = Session::with_cache(options2, cache.clone());
    let second = session2.run(StageKey::Typecheck).unwrap();
    assert!(second.from_cache);
    assert_eq!(second.artifact_hash, first.artifact_hash);

    let options3 = PipelineOptions::new("<div>${name}</div>".to_string(), empty_semantics(), "Other".to_string());
    let mut session3 = Session::with_cache(options3, cache);
    let third = session3.run(StageKey::Typecheck).unwrap();
    assert!(!third.from_cache, "a different root vm type changes the fingerprint and must miss the cache");
}

#[test]
fn s6_diagnostic_demotion() {
    let policy = DiagnosticPolicy::default();
    let span = aurelia_compiler::span::SourceSpan::new(TextSpan::new(0, 1), None);

    let low = RawDiagnostic::new("aurelia/missing-required-bindable", "missing required bindable")
        .with_span(span.clone())
        .with_confidence(Confidence::Low);
    let (_, debug_low) = resolve_all(vec![low], &policy, &[Surface::Cli], "test");
    assert_eq!(debug_low[0].severity, Severity::Info);

    let high = RawDiagnostic::new("aurelia/missing-required-bindable", "missing required bindable")
        .with_span(span)
        .with_confidence(Confidence::High);
    let (_, debug_high) = resolve_all(vec![high], &policy, &[Surface::Cli], "test");
    assert_eq!(debug_high[0].severity, Severity::Error);
}

#[test]
fn determinism_repeated_compilation_yields_identical_artifact_hashes() {
    let html = "<div>${name}</div>".to_string();
    let options1 = PipelineOptions::new(html.clone(), empty_semantics(), "App".to_string());
    let mut session1 = Session::new(options1);
    let a = session1.run(StageKey::Typecheck).unwrap();

    let options2 = PipelineOptions::new(html, empty_semantics(), "App".to_string());
    let mut session2 = Session::new(options2);
    let b = session2.run(StageKey::Typecheck).unwrap();

    assert_eq!(a.artifact_hash, b.artifact_hash);
}
