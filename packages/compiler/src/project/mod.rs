//! Project-Semantics Discovery (C3): the nine-stage pipeline that turns
//! per-file class facts into a converged, registered resource graph (§4.3).
//!
//! This crate does not parse TypeScript/JavaScript itself; like the HTML
//! tree and the VM reflection token, a real embedder's source analyzer
//! hands in already-extracted [`ClassFact`]s (decorator calls, `$au` static
//! fields, `define()` calls, `@bindable` members) the same way upstream
//! collaborators are treated as opaque elsewhere in this crate.

pub mod canonical;
pub mod convergence;

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diagnostics::RawDiagnostic;
use crate::identity::SourceFileId;
use canonical::CanonicalSourceId;
use convergence::{converge, EvidenceAtom, SourceKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoratorFact {
    pub name: String,
    pub args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefineCallFact {
    pub resource_kind: String,
    pub args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindableMemberFact {
    pub name: String,
    pub ty: Option<String>,
    pub mode: Option<String>,
    pub attribute: Option<String>,
    pub required: Option<bool>,
}

/// One class's worth of pre-extracted facts, handed in by the caller's
/// source analyzer. `registers`/`imports` feed the registration stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassFact {
    pub class_name: String,
    pub file: SourceFileId,
    pub package_name: Option<String>,
    pub node_modules_pkg: Option<String>,
    pub workspace_pkg: Option<String>,
    pub decorators: Vec<DecoratorFact>,
    pub static_au: Option<Value>,
    pub define_calls: Vec<DefineCallFact>,
    pub bindable_members: Vec<BindableMemberFact>,
    pub sibling_template: Option<String>,
    pub registers: Vec<String>,
    pub imports: Vec<String>,
}

const RESOURCE_DECORATORS: &[(&str, &str)] =
    &[("customElement", "custom-element"), ("customAttribute", "custom-attribute"), ("valueConverter", "value-converter"), ("bindingBehavior", "binding-behavior")];

fn decorator_kind(name: &str) -> Option<&'static str> {
    RESOURCE_DECORATORS.iter().find(|(n, _)| *n == name).map(|(_, k)| *k)
}

/// Convention fallback: strip a recognized class-name suffix, kebab-case
/// the remainder. A sibling template is required for a convention match to
/// count as a custom element (there is no decorator/static/define evidence
/// to fall back on otherwise).
fn convention_name(class_name: &str) -> String {
    let stripped = class_name.strip_suffix("CustomElement").or_else(|| class_name.strip_suffix("Component")).unwrap_or(class_name);
    let mut out = String::new();
    for (i, ch) in stripped.char_indices() {
        if ch.is_uppercase() && i > 0 {
            out.push('-');
        }
        out.extend(ch.to_lowercase());
    }
    out
}

/// Stage 1: Extract. Per-file, no cross-file dependency; the one place
/// this crate fans out across a `rayon` thread pool.
fn extract(facts: &[ClassFact]) -> Vec<(ClassFact, Vec<EvidenceAtom>, Vec<RawDiagnostic>)> {
    facts.par_iter().map(|fact| { let (atoms, diags) = extract_atoms(fact); (fact.clone(), atoms, diags) }).collect()
}

/// A decorator whose arguments the upstream source analyzer could not
/// statically evaluate is represented as `args: Value::Null` (as opposed to
/// `Value::Object({})` for a deliberately argument-less call); that shape
/// still contributes a convention-name fallback but is worth surfacing.
fn extract_atoms(fact: &ClassFact) -> (Vec<EvidenceAtom>, Vec<RawDiagnostic>) {
    let mut atoms = Vec::new();
    let mut diags = Vec::new();
    let mut seq = 0u32;
    let mut next_id = |prefix: &str| {
        seq += 1;
        format!("{}#{}:{}", fact.class_name, prefix, seq)
    };

    for dec in &fact.decorators {
        if let Some(kind) = decorator_kind(&dec.name) {
            if dec.args.is_null() {
                diags.push(RawDiagnostic::new(
                    "aurelia/project/unanalyzable-decorator",
                    format!("could not statically analyze the arguments to @{} on `{}`", dec.name, fact.class_name),
                ));
            }
            let name = dec.args.get("name").and_then(|v| v.as_str()).map(|s| s.to_string()).unwrap_or_else(|| convention_name(&fact.class_name));
            atoms.push(EvidenceAtom { atom_id: next_id("dec-kind"), field: "resource.resourceKind".to_string(), value: Value::String(kind.to_string()), source_kind: SourceKind::Decorator, evidence_rank: 0 });
            atoms.push(EvidenceAtom { atom_id: next_id("dec-name"), field: "resource.resourceName".to_string(), value: Value::String(name), source_kind: SourceKind::Decorator, evidence_rank: 0 });
            atoms.push(EvidenceAtom { atom_id: next_id("dec-class"), field: "resource.className".to_string(), value: Value::String(fact.class_name.clone()), source_kind: SourceKind::Decorator, evidence_rank: 0 });
            if let Some(containerless) = dec.args.get("containerless") {
                atoms.push(EvidenceAtom { atom_id: next_id("dec-containerless"), field: "resource.containerless".to_string(), value: containerless.clone(), source_kind: SourceKind::Decorator, evidence_rank: 0 });
            }
        }
    }

    if let Some(static_au) = &fact.static_au {
        if let Some(kind) = static_au.get("type").and_then(|v| v.as_str()) {
            atoms.push(EvidenceAtom { atom_id: next_id("static-kind"), field: "resource.resourceKind".to_string(), value: Value::String(kind.to_string()), source_kind: SourceKind::StaticAu, evidence_rank: 1 });
        }
        if let Some(name) = static_au.get("name").and_then(|v| v.as_str()) {
            atoms.push(EvidenceAtom { atom_id: next_id("static-name"), field: "resource.resourceName".to_string(), value: Value::String(name.to_string()), source_kind: SourceKind::StaticAu, evidence_rank: 1 });
        }
        atoms.push(EvidenceAtom { atom_id: next_id("static-class"), field: "resource.className".to_string(), value: Value::String(fact.class_name.clone()), source_kind: SourceKind::StaticAu, evidence_rank: 1 });
    }

    for call in &fact.define_calls {
        let name = call.args.get("name").and_then(|v| v.as_str()).map(|s| s.to_string()).unwrap_or_else(|| convention_name(&fact.class_name));
        atoms.push(EvidenceAtom { atom_id: next_id("define-kind"), field: "resource.resourceKind".to_string(), value: Value::String(call.resource_kind.clone()), source_kind: SourceKind::DefineCall, evidence_rank: 2 });
        atoms.push(EvidenceAtom { atom_id: next_id("define-name"), field: "resource.resourceName".to_string(), value: Value::String(name), source_kind: SourceKind::DefineCall, evidence_rank: 2 });
        atoms.push(EvidenceAtom { atom_id: next_id("define-class"), field: "resource.className".to_string(), value: Value::String(fact.class_name.clone()), source_kind: SourceKind::DefineCall, evidence_rank: 2 });
    }

    let has_explicit = atoms.iter().any(|a| a.field == "resource.resourceKind");
    if !has_explicit && fact.sibling_template.is_some() {
        atoms.push(EvidenceAtom { atom_id: next_id("conv-kind"), field: "resource.resourceKind".to_string(), value: Value::String("custom-element".to_string()), source_kind: SourceKind::Convention, evidence_rank: 3 });
        atoms.push(EvidenceAtom { atom_id: next_id("conv-name"), field: "resource.resourceName".to_string(), value: Value::String(convention_name(&fact.class_name)), source_kind: SourceKind::Convention, evidence_rank: 3 });
        atoms.push(EvidenceAtom { atom_id: next_id("conv-class"), field: "resource.className".to_string(), value: Value::String(fact.class_name.clone()), source_kind: SourceKind::Convention, evidence_rank: 3 });
    }

    for member in &fact.bindable_members {
        let ty = member.ty.clone().map(Value::String).unwrap_or(Value::Null);
        let mode = member.mode.clone().map(Value::String).unwrap_or(Value::Null);
        let required = member.required.map(Value::Bool).unwrap_or(Value::Null);
        atoms.push(EvidenceAtom { atom_id: next_id(&format!("bindable-{}-ty", member.name)), field: format!("bindables.{}.type", member.name), value: ty, source_kind: SourceKind::Decorator, evidence_rank: 0 });
        atoms.push(EvidenceAtom { atom_id: next_id(&format!("bindable-{}-mode", member.name)), field: format!("bindables.{}.mode", member.name), value: mode, source_kind: SourceKind::Decorator, evidence_rank: 0 });
        atoms.push(EvidenceAtom { atom_id: next_id(&format!("bindable-{}-required", member.name)), field: format!("bindables.{}.required", member.name), value: required, source_kind: SourceKind::Decorator, evidence_rank: 0 });
    }

    (atoms, diags)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bindable {
    pub name: String,
    pub ty: String,
    pub mode: String,
    pub attribute: String,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDef {
    pub id: CanonicalSourceId,
    pub kind: String,
    pub name: String,
    pub class_name: String,
    pub containerless: bool,
    pub bindables: Vec<Bindable>,
    pub sibling_template: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrationGraph {
    /// `(registrant class, registered resource/class name)` edges.
    pub edges: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceGraph {
    pub scopes: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSemantics {
    pub resources: Vec<ResourceDef>,
    pub registration: RegistrationGraph,
    pub graph: ResourceGraph,
    pub diags: Vec<RawDiagnostic>,
}

impl ProjectSemantics {
    pub fn find_by_name(&self, name: &str) -> Option<&ResourceDef> {
        self.resources.iter().find(|r| r.name == name)
    }
}

/// Run stages 1 (extract) through 8 (snapshot); stage 9 (templates) is the
/// caller's job once lowering has produced an `IrModule` per file, since
/// this module has no HTML parser dependency of its own.
pub fn discover(facts: &[ClassFact]) -> ProjectSemantics {
    let extracted = extract(facts);

    let mut resources = Vec::new();
    let mut diags = Vec::new();
    let mut edges = Vec::new();
    let mut scopes: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let known_classes: std::collections::HashSet<&str> = facts.iter().map(|f| f.class_name.as_str()).collect();

    for (fact, atoms, fact_diags) in &extracted {
        diags.extend(fact_diags.iter().cloned());
        if atoms.is_empty() {
            continue;
        }
        let (fields, field_diags) = converge(atoms);
        diags.extend(field_diags);

        let kind = fields.get("resource.resourceKind").and_then(|v| v.as_str()).map(|s| s.to_string());
        let name = fields.get("resource.resourceName").and_then(|v| v.as_str()).map(|s| s.to_string());
        let (Some(kind), Some(name)) = (kind, name) else { continue };

        let bindables = fact
            .bindable_members
            .iter()
            .map(|m| {
                let ty = fields.get(&format!("bindables.{}.type", m.name)).and_then(|v| v.as_str()).unwrap_or("unknown").to_string();
                let mode = fields.get(&format!("bindables.{}.mode", m.name)).and_then(|v| v.as_str()).unwrap_or("toView").to_string();
                let required = fields.get(&format!("bindables.{}.required", m.name)).and_then(|v| v.as_bool()).unwrap_or(false);
                Bindable { name: m.name.clone(), ty, mode, attribute: m.attribute.clone().unwrap_or_else(|| kebab(&m.name)), required }
            })
            .collect();

        let containerless = fields.get("resource.containerless").and_then(|v| v.as_bool()).unwrap_or(false);

        let id = CanonicalSourceId::new(
            source_kind_str(winning_kind_source(atoms, "resource.resourceKind")),
            fact.package_name.clone(),
            fact.file.as_str(),
            fact.class_name.clone(),
            kind.clone(),
            name.clone(),
            fact.node_modules_pkg.as_deref(),
            fact.workspace_pkg.as_deref(),
        );

        for target in &fact.registers {
            edges.push((fact.class_name.clone(), target.clone()));
        }
        for imported in &fact.imports {
            edges.push((fact.class_name.clone(), imported.clone()));
            if !known_classes.contains(imported.as_str()) {
                diags.push(RawDiagnostic::new("aurelia/unresolved-import", format!("`{}` imports `{}`, which no discovered class declares", fact.class_name, imported)));
            }
        }
        scopes.entry(kind.clone()).or_default().push(name.clone());

        resources.push(ResourceDef { id, kind, name, class_name: fact.class_name.clone(), containerless, bindables, sibling_template: fact.sibling_template.clone() });
    }

    let mut seen = std::collections::HashSet::new();
    resources.retain(|r| seen.insert(r.id.to_key()));

    ProjectSemantics { resources, registration: RegistrationGraph { edges }, graph: ResourceGraph { scopes }, diags }
}

/// Which evidence pattern actually won convergence for `field`, mirroring
/// `converge()`'s own `(source_kind rank, evidence_rank, atom_id)` ordering
/// so the resource's canonical id records where it was really discovered.
fn winning_kind_source(atoms: &[EvidenceAtom], field: &str) -> Option<SourceKind> {
    atoms.iter().filter(|a| a.field == field).min_by(|a, b| (a.source_kind, a.evidence_rank, &a.atom_id).cmp(&(b.source_kind, b.evidence_rank, &b.atom_id))).map(|a| a.source_kind)
}

fn source_kind_str(kind: Option<SourceKind>) -> &'static str {
    match kind {
        Some(SourceKind::Decorator) => "decorator",
        Some(SourceKind::StaticAu) => "static-au",
        Some(SourceKind::DefineCall) => "define-call",
        Some(SourceKind::Convention) => "convention",
        None => "project-discovery",
    }
}

fn kebab(name: &str) -> String {
    let mut out = String::new();
    for (i, ch) in name.char_indices() {
        if ch.is_uppercase() && i > 0 {
            out.push('-');
        }
        out.extend(ch.to_lowercase());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_fact() -> ClassFact {
        ClassFact {
            class_name: "GreeterCustomElement".to_string(),
            file: SourceFileId::new("/src/greeter.ts"),
            package_name: None,
            node_modules_pkg: None,
            workspace_pkg: None,
            decorators: vec![DecoratorFact { name: "customElement".to_string(), args: serde_json::json!({"name": "greeter"}) }],
            static_au: None,
            define_calls: Vec::new(),
            bindable_members: vec![BindableMemberFact { name: "name".to_string(), ty: Some("string".to_string()), mode: Some("toView".to_string()), attribute: None, required: None }],
            sibling_template: Some("/src/greeter.html".to_string()),
            registers: Vec::new(),
            imports: Vec::new(),
        }
    }

    #[test]
    fn discovers_decorator_declared_element() {
        let semantics = discover(&[simple_fact()]);
        assert_eq!(semantics.resources.len(), 1);
        let res = &semantics.resources[0];
        assert_eq!(res.kind, "custom-element");
        assert_eq!(res.name, "greeter");
        assert_eq!(res.bindables.len(), 1);
        assert_eq!(res.bindables[0].ty, "string");
        assert_eq!(res.id.source_kind, "decorator");
    }

    #[test]
    fn convention_fallback_without_decorator() {
        let mut fact = simple_fact();
        fact.decorators.clear();
        let semantics = discover(&[fact]);
        assert_eq!(semantics.resources.len(), 1);
        assert_eq!(semantics.resources[0].name, "greeter");
        assert_eq!(semantics.resources[0].kind, "custom-element");
        assert_eq!(semantics.resources[0].id.source_kind, "convention");
    }

    #[test]
    fn skips_classes_with_no_evidence_at_all() {
        let mut fact = simple_fact();
        fact.decorators.clear();
        fact.sibling_template = None;
        let semantics = discover(&[fact]);
        assert!(semantics.resources.is_empty());
    }

    #[test]
    fn unanalyzable_decorator_args_are_flagged() {
        let mut fact = simple_fact();
        fact.decorators = vec![DecoratorFact { name: "customElement".to_string(), args: Value::Null }];
        let semantics = discover(&[fact]);
        assert_eq!(semantics.resources.len(), 1);
        assert!(semantics.diags.iter().any(|d| d.code == "aurelia/project/unanalyzable-decorator"));
        // still falls back to convention naming rather than dropping the resource
        assert_eq!(semantics.resources[0].name, "greeter");
    }

    #[test]
    fn unresolved_import_is_flagged() {
        let mut fact = simple_fact();
        fact.imports = vec!["SomeMissingClass".to_string()];
        let semantics = discover(&[fact]);
        assert!(semantics.diags.iter().any(|d| d.code == "aurelia/unresolved-import"));
    }
}
