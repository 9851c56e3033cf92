use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use node_semver::Version;
use serde::{Deserialize, Serialize};

use crate::PinnedTree;

/// A package manifest (`package.json`), reduced to the fields the installer
/// actually consumes.
#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dev_dependencies: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub optional_dependencies: BTreeMap<String, String>,

    /// package.json scripts object. Only the lifecycle events are ever
    /// invoked by the installer; anything else is inert data here.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub scripts: HashMap<String, String>,

    /// A pinned dependency tree shipped inside the package itself. When
    /// present, it overrides range resolution for the package's subtree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shrinkwrap: Option<PinnedTree>,
}

impl Manifest {
    /// Reads and parses a manifest from a `package.json` path.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }
}
