//! Branded identifiers and the deterministic hashing they are built on.
//!
//! Every id in this crate is a pure function of its payload: two compiler
//! runs fed the same inputs must mint equal ids, because the dependency
//! graph, the cache, and the provenance index all use ids as keys across
//! process boundaries.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A normalized, absolute path used as the stable identity of a source
/// document. Normalization (slash direction, case folding under
/// case-insensitive filesystems) is the filesystem context's job; this type
/// just brands the result so it can't be confused with an arbitrary string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceFileId(pub String);

impl SourceFileId {
    pub fn new(normalized_path: impl Into<String>) -> Self {
        SourceFileId(normalized_path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceFileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a single DOM node within a template, encoding the
/// depth-first index path used to produce it (`root/2/1#text@0`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn root() -> Self {
        NodeId("root".to_string())
    }

    /// Derive a child id from a parent path, a sibling index, a node-kind
    /// tag, and a per-kind counter (`@idx`). Two calls with identical
    /// arguments always produce an identical id, and permuting unrelated
    /// siblings elsewhere in the tree never perturbs it, since nothing
    /// outside the `(parent, child_index, kind, idx)` tuple feeds in.
    pub fn child(parent: &NodeId, child_index: usize, kind: &str, idx: usize) -> Self {
        NodeId(format!("{}/{}#{}@{}", parent.0, child_index, kind, idx))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a template (root document or a nested template produced by
/// a controller/projection split).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateId(pub String);

impl TemplateId {
    pub fn new(id: impl Into<String>) -> Self {
        TemplateId(id.into())
    }

    pub fn synthetic(parent: &TemplateId, discriminant: &str) -> Self {
        TemplateId(format!("{}::{}", parent.0, discriminant))
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a single parsed expression. Derived from a hash of its
/// canonical payload (file, span, expression kind, normalized source text),
/// so expressions with identical text at identical offsets in identical
/// files collide on purpose (they *are* the same expression), and any
/// change to any of those four inputs mints a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExprId(pub u64);

impl ExprId {
    pub fn from_payload(file: Option<&SourceFileId>, start: u32, end: u32, expression_type: &str, normalized_code: &str) -> Self {
        let payload = serde_json::json!({
            "file": file.map(|f| f.as_str()),
            "start": start,
            "end": end,
            "expressionType": expression_type,
            "code": normalized_code,
        });
        ExprId(stable_hash_u64(&payload))
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expr:{:016x}", self.0)
    }
}

/// Identity of a lexical frame within a template's scope tree. Frames are
/// allocated in a deterministic depth-first order during scope binding, so
/// a plain counter is sufficient and stable across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameId(pub u32);

impl FrameId {
    pub const ROOT: FrameId = FrameId(0);

    pub fn next(&self) -> FrameId {
        FrameId(self.0 + 1)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame:{}", self.0)
    }
}

/// Identity of a hydration marker emitted into SSR output (`data-au-hid`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HydrationId(pub u32);

impl fmt::Display for HydrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonicalize a [`serde_json::Value`] so that object keys are sorted at
/// every level, then render it to bytes. Two structurally equal values
/// (irrespective of the original key insertion order) canonicalize to the
/// same bytes, which is the property `stable_hash` depends on.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<(&String, &Value)> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), canonicalize(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// A 64-character hex digest over a canonicalized JSON payload. This is the
/// `stableHash` referenced throughout the pipeline engine and the
/// dependency graph's fingerprints.
pub fn stable_hash(value: &Value) -> String {
    let canonical = canonicalize(value);
    let bytes = serde_json::to_vec(&canonical).expect("canonical JSON always serializes");
    let high = xxhash_rust::xxh3::xxh3_64_with_seed(&bytes, 0);
    let low = xxhash_rust::xxh3::xxh3_64_with_seed(&bytes, 1);
    format!("{:016x}{:016x}{:016x}{:016x}", high, low, high.rotate_left(17), low.rotate_right(23))
}

/// A plain `u64` digest, used when a compact identity (rather than a
/// display-friendly hex string) is what the caller needs, e.g. [`ExprId`].
pub fn stable_hash_u64(value: &Value) -> u64 {
    let canonical = canonicalize(value);
    let bytes = serde_json::to_vec(&canonical).expect("canonical JSON always serializes");
    xxhash_rust::xxh3::xxh3_64(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_hash_ignores_key_order() {
        let a = serde_json::json!({"a": 1, "b": 2});
        let b = serde_json::json!({"b": 2, "a": 1});
        assert_eq!(stable_hash(&a), stable_hash(&b));
    }

    #[test]
    fn stable_hash_is_64_hex_chars() {
        let digest = stable_hash(&serde_json::json!({"x": 1}));
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn node_id_depends_only_on_path_and_kind() {
        let root = NodeId::root();
        let a = NodeId::child(&root, 2, "element", 0);
        let b = NodeId::child(&root, 2, "element", 0);
        assert_eq!(a, b);
    }

    #[test]
    fn node_id_unaffected_by_unrelated_siblings() {
        let root = NodeId::root();
        let target_before = NodeId::child(&root, 1, "element", 0);
        // Simulate inserting an unrelated sibling subtree; the target's own
        // (parent, index, kind, idx) tuple is untouched.
        let _unrelated = NodeId::child(&root, 5, "comment", 0);
        let target_after = NodeId::child(&root, 1, "element", 0);
        assert_eq!(target_before, target_after);
    }

    #[test]
    fn expr_id_changes_with_code() {
        let file = SourceFileId::new("/a.html");
        let a = ExprId::from_payload(Some(&file), 0, 4, "IsProperty", "name");
        let b = ExprId::from_payload(Some(&file), 0, 4, "IsProperty", "name2");
        assert_ne!(a, b);
    }
}
