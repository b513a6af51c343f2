//! Rename and code-action gating (§4.10 "Rename is gated by
//! `RefactorPolicy`" / "Code actions are collected from workspace and TS
//! sources in `sourceOrder`").

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::identity::SourceFileId;
use crate::span::SourceSpan;
use crate::template::dom::DomNode;

use super::query;
use super::Compilation;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenamePolicy {
    /// Target classes a rename is permitted to touch: `"resource"` or
    /// `"bindable"`.
    pub allowed_targets: Vec<String>,
    pub allow_typescript_fallback: bool,
}

impl Default for RenamePolicy {
    fn default() -> Self {
        RenamePolicy { allowed_targets: vec!["resource".to_string()], allow_typescript_fallback: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeActionPolicy {
    /// Decision points the caller has already resolved, e.g. `"import-style"`.
    pub resolved_decisions: HashSet<String>,
}

impl Default for CodeActionPolicy {
    fn default() -> Self {
        CodeActionPolicy { resolved_decisions: HashSet::new() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefactorPolicy {
    pub rename: RenamePolicy,
    pub code_actions: CodeActionPolicy,
}

/// `{error: {kind, message, retryable}}` (§7 "Error handling design").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefactorError {
    pub kind: String,
    pub message: String,
    pub retryable: bool,
}

impl RefactorError {
    fn new(kind: &str, message: impl Into<String>, retryable: bool) -> Self {
        RefactorError { kind: kind.to_string(), message: message.into(), retryable }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextEdit {
    pub span: SourceSpan,
    pub new_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameEdit {
    pub edits: Vec<TextEdit>,
}

/// `custom-element → bindable-attribute → value-converter →
/// binding-behavior`: the first route with a non-empty edit wins.
const RENAME_ROUTES: &[&str] = &["custom-element", "bindable-attribute", "value-converter", "binding-behavior"];

/// The decision a caller must have resolved before a rename of this target
/// class is allowed to proceed, if any. Renaming a resource declaration
/// implies renaming its backing source file by convention, which is a
/// decision the policy must make explicit rather than assume.
fn required_decision_for(target_class: &str) -> Option<&'static str> {
    match target_class {
        "resource" => Some("file-rename"),
        _ => None,
    }
}

struct RenameTarget {
    class: &'static str,
    resource_name: String,
    resource_kind: String,
    source_kind: String,
}

fn classify_rename_target(comp: &Compilation, offset: u32) -> Option<RenameTarget> {
    let node_id = query::node_at(comp, offset)?;
    let tag = query::find_tag(comp, &node_id)?;
    let resource = comp.semantics.find_by_name(tag)?;
    Some(RenameTarget { class: "resource", resource_name: resource.name.clone(), resource_kind: resource.kind.clone(), source_kind: resource.id.source_kind.clone() })
}

fn try_route(comp: &Compilation, target: &RenameTarget, route: &str, new_name: &str) -> Option<RenameEdit> {
    if target.resource_kind != route {
        return None;
    }
    let file = SourceFileId::new(comp.uri.0.clone());
    let mut edits = Vec::new();
    for template in &comp.module.templates {
        template.dom.walk(&mut |node| {
            if let DomNode::Element { tag, tag_loc, .. } = node {
                if tag == &target.resource_name {
                    edits.push(TextEdit { span: SourceSpan::new(*tag_loc, Some(file.clone())), new_text: new_name.to_string() });
                }
            }
        });
    }
    if edits.is_empty() {
        None
    } else {
        Some(RenameEdit { edits })
    }
}

/// Rename the resource named at `offset` to `new_name`, denying per
/// `policy` before any provenance lookup runs. Never mutates the workspace
/// source store; the caller applies the returned edits itself.
pub fn rename(comp: &Compilation, policy: &RefactorPolicy, offset: u32, new_name: &str) -> Result<RenameEdit, RefactorError> {
    let target = classify_rename_target(comp, offset).ok_or_else(|| RefactorError::new("no-semantic-target", "no renameable symbol at this position", false))?;

    if !policy.rename.allowed_targets.iter().any(|t| t == target.class) {
        return Err(RefactorError::new("target-not-allowed", format!("rename of `{}` targets is not permitted by policy", target.class), false));
    }
    if target.source_kind == "builtin" || target.source_kind == "config" {
        return Err(RefactorError::new("origin-not-allowed", "cannot rename a builtin or config-declared resource", false));
    }
    if let Some(decision) = required_decision_for(target.class) {
        if !policy.code_actions.resolved_decisions.contains(decision) {
            return Err(RefactorError::new("refactor-decision-required", format!("resolving this rename requires deciding `{}` first", decision), false));
        }
    }

    for route in RENAME_ROUTES {
        if let Some(edit) = try_route(comp, &target, route, new_name) {
            return Ok(edit);
        }
    }
    Err(RefactorError::new("no-semantic-provenance", "no provenance-backed edit found for this rename", true))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeAction {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub source_order: u32,
}

/// Workspace-sourced code actions at `offset`, filtered by `requested_kinds`
/// (empty means unfiltered) and deduped by id. Collected in `sourceOrder`;
/// a real embedder would append TS-sourced actions after these in the same
/// order before filtering.
pub fn code_actions(comp: &Compilation, offset: u32, requested_kinds: &[String]) -> Vec<CodeAction> {
    let mut actions = Vec::new();
    let mut source_order = 0u32;

    if let Some(node_id) = query::node_at(comp, offset) {
        if let Some(tag) = query::find_tag(comp, &node_id) {
            if let Some(resource) = comp.semantics.find_by_name(tag) {
                actions.push(CodeAction {
                    id: format!("rename-resource:{}", resource.name),
                    kind: "refactor.rename".to_string(),
                    title: format!("Rename `{}`", resource.name),
                    source_order,
                });
                source_order += 1;
            }
        }
    }

    let mut seen = HashSet::new();
    actions.retain(|a| seen.insert(a.id.clone()));
    if !requested_kinds.is_empty() {
        actions.retain(|a| requested_kinds.iter().any(|k| k == &a.kind));
    }
    actions.sort_by_key(|a| a.source_order);
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::EmitMode;
    use crate::project::canonical::CanonicalSourceId;
    use crate::project::{Bindable, ProjectSemantics, RegistrationGraph, ResourceDef, ResourceGraph};
    use crate::provenance::Uri;
    use crate::workspace::{Workspace, WorkspaceOptions};

    fn semantics_with_greeter() -> ProjectSemantics {
        ProjectSemantics {
            resources: vec![ResourceDef {
                id: CanonicalSourceId::new("project-discovery", None, "/g.ts", "Greeter", "custom-element", "greeter", None, None),
                kind: "custom-element".to_string(),
                name: "greeter".to_string(),
                class_name: "Greeter".to_string(),
                containerless: false,
                bindables: vec![Bindable { name: "name".to_string(), ty: "string".to_string(), mode: "toView".to_string(), attribute: "name".to_string(), required: false }],
                sibling_template: None,
            }],
            registration: RegistrationGraph::default(),
            graph: ResourceGraph::default(),
            diags: Vec::new(),
        }
    }

    fn workspace() -> (Workspace, Uri) {
        let mut options = WorkspaceOptions::default();
        options.overlay_mode = EmitMode::HostTyped;
        let mut ws = Workspace::new(semantics_with_greeter(), options);
        let uri = Uri("/app.html".to_string());
        ws.open_document(uri.clone(), "<greeter></greeter>");
        (ws, uri)
    }

    #[test]
    fn rename_is_denied_when_the_target_class_is_not_allowed() {
        let (mut ws, uri) = workspace();
        let comp = ws.get_compilation(&uri).unwrap();
        let mut policy = RefactorPolicy::default();
        policy.rename.allowed_targets = vec!["bindable".to_string()];
        let err = rename(&comp, &policy, 1, "salutation").unwrap_err();
        assert_eq!(err.kind, "target-not-allowed");
        assert!(!err.retryable);
    }

    #[test]
    fn rename_is_denied_when_the_file_rename_decision_is_unresolved() {
        let (mut ws, uri) = workspace();
        let comp = ws.get_compilation(&uri).unwrap();
        let policy = RefactorPolicy::default();
        let err = rename(&comp, &policy, 1, "salutation").unwrap_err();
        assert_eq!(err.kind, "refactor-decision-required");
        assert!(!err.retryable);
    }

    #[test]
    fn rename_succeeds_once_the_file_rename_decision_is_resolved() {
        let (mut ws, uri) = workspace();
        let comp = ws.get_compilation(&uri).unwrap();
        let mut policy = RefactorPolicy::default();
        policy.code_actions.resolved_decisions.insert("file-rename".to_string());
        let edit = rename(&comp, &policy, 1, "salutation").expect("rename should succeed");
        assert_eq!(edit.edits.len(), 1);
        assert_eq!(edit.edits[0].new_text, "salutation");
    }

    #[test]
    fn denied_rename_does_not_touch_the_workspace_source_store() {
        let (mut ws, uri) = workspace();
        let before = ws.document_text(&uri).unwrap().to_string();
        let comp = ws.get_compilation(&uri).unwrap();
        let policy = RefactorPolicy::default();
        assert!(rename(&comp, &policy, 1, "salutation").is_err());
        assert_eq!(ws.document_text(&uri).unwrap(), before);
    }

    #[test]
    fn code_actions_offer_a_rename_for_the_resource_at_the_cursor() {
        let (mut ws, uri) = workspace();
        let comp = ws.get_compilation(&uri).unwrap();
        let actions = code_actions(&comp, 1, &[]);
        assert!(actions.iter().any(|a| a.id == "rename-resource:greeter"));
    }

    #[test]
    fn code_actions_are_filtered_by_requested_kind() {
        let (mut ws, uri) = workspace();
        let comp = ws.get_compilation(&uri).unwrap();
        let actions = code_actions(&comp, 1, &["quickfix".to_string()]);
        assert!(actions.is_empty());
    }
}
