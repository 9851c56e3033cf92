use std::collections::{BTreeMap, HashMap};

use node_semver::Version;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Manifest;

/// A registry document describing every published version of a package.
#[derive(Clone, Default, Debug, PartialEq, Serialize, Deserialize)]
pub struct Packument {
    #[serde(default, rename = "dist-tags", skip_serializing_if = "HashMap::is_empty")]
    pub tags: HashMap<String, Version>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub versions: BTreeMap<Version, VersionMetadata>,
}

impl Packument {
    /// A single-version packument, as synthesized for packages that don't
    /// come from a registry (directories, tarballs).
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let mut packument = Packument::default();
        if let Some(version) = &manifest.version {
            packument.tags.insert("latest".into(), version.clone());
            packument.versions.insert(
                version.clone(),
                VersionMetadata {
                    dist: Dist::default(),
                    manifest: manifest.clone(),
                },
            );
        }
        packument
    }
}

/// Metadata for one published version of a package.
#[derive(Clone, Default, Debug, PartialEq, Serialize, Deserialize)]
pub struct VersionMetadata {
    #[serde(default)]
    pub dist: Dist,

    #[serde(flatten)]
    pub manifest: Manifest,
}

#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dist {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tarball: Option<Url>,
}
