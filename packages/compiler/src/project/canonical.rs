//! The canonical source id (§4.3 "Canonical source id").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFileKind {
    NodeModule,
    Workspace,
    Absolute,
}

/// `{v:1, sourceKind, packageName, sourceFileKey, symbolKey, resourceKind, resourceName}`.
/// Two atoms with an identical canonical id are the same resource declaration
/// seen twice (e.g. re-exported) and are deduplicated before merging.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalSourceId {
    pub v: u32,
    pub source_kind: String,
    pub package_name: Option<String>,
    pub source_file_key: String,
    pub symbol_key: String,
    pub resource_kind: String,
    pub resource_name: String,
}

impl CanonicalSourceId {
    pub fn new(
        source_kind: impl Into<String>,
        package_name: Option<String>,
        file_path: &str,
        symbol_key: impl Into<String>,
        resource_kind: impl Into<String>,
        resource_name: impl Into<String>,
        node_modules_pkg: Option<&str>,
        workspace_pkg: Option<&str>,
    ) -> Self {
        let source_file_key = if let Some(pkg) = node_modules_pkg {
            format!("npm:{}/{}", pkg, file_path)
        } else if let Some(pkg) = workspace_pkg {
            format!("ws:{}/{}", pkg, file_path)
        } else {
            format!("abs:{}", file_path)
        };
        CanonicalSourceId {
            v: 1,
            source_kind: source_kind.into(),
            package_name,
            source_file_key,
            symbol_key: symbol_key.into(),
            resource_kind: resource_kind.into(),
            resource_name: resource_name.into(),
        }
    }

    /// A deterministic rendering usable as a plain string key in dedup sets
    /// and as a dependency-graph node id for `convergence-entry` nodes.
    pub fn to_key(&self) -> String {
        format!(
            "v{}:{}:{}:{}:{}:{}:{}",
            self.v,
            self.source_kind,
            self.package_name.as_deref().unwrap_or(""),
            self.source_file_key,
            self.symbol_key,
            self.resource_kind,
            self.resource_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_npm_prefix_for_node_modules() {
        let id = CanonicalSourceId::new("decorator", None, "index.js", "Foo", "custom-element", "foo", Some("aurelia"), None);
        assert!(id.source_file_key.starts_with("npm:aurelia/"));
    }

    #[test]
    fn falls_back_to_absolute_path() {
        let id = CanonicalSourceId::new("convention", None, "/src/foo.ts", "Foo", "custom-element", "foo", None, None);
        assert!(id.source_file_key.starts_with("abs:"));
    }

    #[test]
    fn to_key_is_deterministic() {
        let id = CanonicalSourceId::new("decorator", None, "/src/foo.ts", "Foo", "custom-element", "foo", None, None);
        assert_eq!(id.to_key(), id.to_key());
    }
}
