use std::collections::BTreeMap;

use node_semver::Version;
use serde::{Deserialize, Serialize};

/// A pinned, recursive dependency map: the shape shared by lockfiles and
/// embedded shrinkwraps. Each entry names an exact version and, optionally,
/// the exact subtree that should be installed beneath it.
#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedTree {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, PinnedNode>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedNode {
    pub version: Version,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, PinnedNode>,
}

impl PinnedTree {
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Total number of entries in the tree, counting nested ones.
    pub fn len(&self) -> usize {
        fn count(deps: &BTreeMap<String, PinnedNode>) -> usize {
            deps.values().map(|node| 1 + count(&node.dependencies)).sum()
        }
        count(&self.dependencies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_nested_entries() {
        let tree: PinnedTree = serde_json::from_str(
            r#"{
                "dependencies": {
                    "a": { "version": "1.0.0", "dependencies": { "b": { "version": "1.0.0" } } },
                    "c": { "version": "1.0.0", "dependencies": { "b": { "version": "2.0.0" } } }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(tree.len(), 4);
        assert!(!tree.is_empty());
    }
}
