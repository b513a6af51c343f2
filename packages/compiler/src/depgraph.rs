//! Dependency Graph (C12): input→output edges and the affected-set query
//! used to decide what a changed input invalidates (§3 "Dependency Graph",
//! §8 invariant 6).
//!
//! This is the one long-lived mutable structure in the engine (§7 "Resource
//! policy"): everything upstream of it (IR, expr table, frames) is
//! immutable once a stage returns. Mutation is confined to
//! [`DependencyGraph::add_node`]/[`add_dependency`]/[`remove_node`]; reads
//! take the same lock so a concurrent writer never produces a torn
//! `getAffected` answer.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    File,
    Config,
    ConvergenceEntry,
    Scope,
    Vocabulary,
    TemplateCompilation,
    TypeState,
    Observation,
    Manifest,
    Infrastructure,
}

/// A node's identity: its kind plus a plain string key. Files use their
/// normalized path; `convergence-entry` nodes use
/// [`crate::project::canonical::CanonicalSourceId::to_key`]; the rest use
/// whatever stable key their producing stage assigns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey(pub String);

impl NodeKey {
    pub fn new(key: impl Into<String>) -> Self {
        NodeKey(key.into())
    }
}

#[derive(Debug, Clone, Default)]
struct Inner {
    nodes: std::collections::HashMap<NodeKey, NodeKind>,
    /// output -> set of inputs it depends on.
    depends_on: std::collections::HashMap<NodeKey, HashSet<NodeKey>>,
    /// input -> set of outputs that depend on it (the reverse index).
    depended_on_by: std::collections::HashMap<NodeKey, HashSet<NodeKey>>,
}

/// A thread-safe node/edge store. The whole structure is guarded by one
/// lock rather than per-field locks, since `getAffected` must see a
/// consistent snapshot across both the node set and the reverse index.
#[derive(Default)]
pub struct DependencyGraph {
    inner: Mutex<Inner>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        DependencyGraph::default()
    }

    pub fn add_node(&self, key: NodeKey, kind: NodeKind) {
        let mut inner = self.inner.lock().expect("dependency graph mutex poisoned");
        inner.nodes.insert(key, kind);
    }

    /// Record that `output` was produced using `input`. Both nodes must
    /// already exist; `add_dependency` does not implicitly create them, so
    /// a caller that forgets `add_node` gets a visible no-op rather than a
    /// silently half-registered node.
    pub fn add_dependency(&self, output: NodeKey, input: NodeKey) {
        let mut inner = self.inner.lock().expect("dependency graph mutex poisoned");
        if !inner.nodes.contains_key(&output) || !inner.nodes.contains_key(&input) {
            return;
        }
        inner.depends_on.entry(output.clone()).or_default().insert(input.clone());
        inner.depended_on_by.entry(input).or_default().insert(output);
    }

    /// Remove a node and every edge touching it, in either direction.
    pub fn remove_node(&self, key: &NodeKey) {
        let mut inner = self.inner.lock().expect("dependency graph mutex poisoned");
        inner.nodes.remove(key);

        if let Some(inputs) = inner.depends_on.remove(key) {
            for input in inputs {
                if let Some(outputs) = inner.depended_on_by.get_mut(&input) {
                    outputs.remove(key);
                }
            }
        }
        if let Some(outputs) = inner.depended_on_by.remove(key) {
            for output in outputs {
                if let Some(inputs) = inner.depends_on.get_mut(&output) {
                    inputs.remove(key);
                }
            }
        }
    }

    /// The transitive reverse-closure of `changed` under `dependedOnBy`,
    /// returned in BFS order (§8 invariant 6). `changed` nodes themselves
    /// are included, matching "no false positives, no omissions" against a
    /// closure that is reflexive over its own seeds.
    pub fn get_affected(&self, changed: &[NodeKey]) -> Vec<NodeKey> {
        let inner = self.inner.lock().expect("dependency graph mutex poisoned");
        let mut seen: HashSet<NodeKey> = HashSet::new();
        let mut order = Vec::new();
        let mut queue: VecDeque<NodeKey> = VecDeque::new();

        for key in changed {
            if seen.insert(key.clone()) {
                queue.push_back(key.clone());
            }
        }

        while let Some(current) = queue.pop_front() {
            order.push(current.clone());
            if let Some(outputs) = inner.depended_on_by.get(&current) {
                let mut next: Vec<&NodeKey> = outputs.iter().collect();
                next.sort();
                for output in next {
                    if seen.insert(output.clone()) {
                        queue.push_back(output.clone());
                    }
                }
            }
        }

        order
    }

    pub fn node_kind(&self, key: &NodeKey) -> Option<NodeKind> {
        let inner = self.inner.lock().expect("dependency graph mutex poisoned");
        inner.nodes.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("dependency graph mutex poisoned").nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_chain() -> DependencyGraph {
        // file -> template-compilation -> type-state, a typical recompile chain.
        let graph = DependencyGraph::new();
        graph.add_node(NodeKey::new("file:/a.ts"), NodeKind::File);
        graph.add_node(NodeKey::new("tmpl:/a.html"), NodeKind::TemplateCompilation);
        graph.add_node(NodeKey::new("types:/a.html"), NodeKind::TypeState);
        graph.add_dependency(NodeKey::new("tmpl:/a.html"), NodeKey::new("file:/a.ts"));
        graph.add_dependency(NodeKey::new("types:/a.html"), NodeKey::new("tmpl:/a.html"));
        graph
    }

    #[test]
    fn affected_set_is_the_transitive_reverse_closure() {
        let graph = graph_with_chain();
        let affected = graph.get_affected(&[NodeKey::new("file:/a.ts")]);
        assert_eq!(affected, vec![NodeKey::new("file:/a.ts"), NodeKey::new("tmpl:/a.html"), NodeKey::new("types:/a.html")]);
    }

    #[test]
    fn unrelated_node_is_never_affected() {
        let graph = graph_with_chain();
        graph.add_node(NodeKey::new("file:/unrelated.ts"), NodeKind::File);
        let affected = graph.get_affected(&[NodeKey::new("file:/a.ts")]);
        assert!(!affected.contains(&NodeKey::new("file:/unrelated.ts")));
    }

    #[test]
    fn removing_a_node_drops_its_edges() {
        let graph = graph_with_chain();
        graph.remove_node(&NodeKey::new("tmpl:/a.html"));
        let affected = graph.get_affected(&[NodeKey::new("file:/a.ts")]);
        assert_eq!(affected, vec![NodeKey::new("file:/a.ts")]);
    }

    #[test]
    fn dependency_on_unregistered_node_is_ignored() {
        let graph = DependencyGraph::new();
        graph.add_node(NodeKey::new("file:/a.ts"), NodeKind::File);
        graph.add_dependency(NodeKey::new("file:/a.ts"), NodeKey::new("file:/never-added.ts"));
        let affected = graph.get_affected(&[NodeKey::new("file:/never-added.ts")]);
        assert!(affected.is_empty());
    }
}
