use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use warren_common::{Dist, Manifest, Packument, VersionMetadata};
use warren_spec::PackageSpec;

use crate::archive;
use crate::error::{FetchError, Result};
use crate::package::Package;
use crate::resolver::PackageResolution;
use crate::sources::PackageSource;

/// An in-memory registry. Test suites (and embedders that want hermetic
/// installs) publish manifests and file trees into it, and [`MemorySource`]
/// serves them the way a real registry would.
#[derive(Debug, Default, Clone)]
pub struct MemoryRegistry {
    inner: Arc<RwLock<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    packuments: HashMap<String, Packument>,
    files: HashMap<(String, String), Vec<(String, Vec<u8>)>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a manifest. The manifest must carry a name and version; the
    /// `latest` tag always tracks the highest published version.
    pub fn publish(&self, manifest: Manifest) {
        self.publish_with_files(manifest, Vec::new());
    }

    /// Publish a manifest from raw `package.json` text.
    pub fn publish_json(&self, raw: &str) {
        let manifest: Manifest =
            serde_json::from_str(raw).expect("MemoryRegistry::publish_json takes valid JSON");
        self.publish(manifest);
    }

    /// Publish a manifest along with the file entries its tarball should
    /// contain. A `package.json` entry is always generated from the manifest
    /// itself.
    pub fn publish_with_files(&self, manifest: Manifest, files: Vec<(String, Vec<u8>)>) {
        let name = manifest
            .name
            .clone()
            .expect("published manifests must have a name");
        let version = manifest
            .version
            .clone()
            .expect("published manifests must have a version");
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let packument = inner.packuments.entry(name.clone()).or_default();
        packument.versions.insert(
            version.clone(),
            VersionMetadata {
                dist: Dist::default(),
                manifest,
            },
        );
        let latest = packument
            .versions
            .keys()
            .next_back()
            .expect("just inserted a version")
            .clone();
        packument.tags.insert("latest".into(), latest);
        inner
            .files
            .insert((name, version.to_string()), files);
    }

    fn packument(&self, name: &str) -> Option<Packument> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .packuments
            .get(name)
            .cloned()
    }

    fn files(&self, name: &str, version: &str) -> Vec<(String, Vec<u8>)> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .files
            .get(&(name.to_string(), version.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

/// A [`PackageSource`] backed by a [`MemoryRegistry`].
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    registry: MemoryRegistry,
}

impl MemorySource {
    pub fn new(registry: MemoryRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl PackageSource for MemorySource {
    async fn name(&self, spec: &PackageSpec, _base_dir: &Path) -> Result<String> {
        match spec {
            PackageSpec::Npm { name, .. } => Ok(name.clone()),
            _ => Err(FetchError::InvalidPackageSpec(spec.clone())),
        }
    }

    async fn packument(&self, spec: &PackageSpec, base_dir: &Path) -> Result<Arc<Packument>> {
        let name = self.name(spec, base_dir).await?;
        self.registry
            .packument(&name)
            .map(Arc::new)
            .ok_or(FetchError::PackageNotFound(name))
    }

    async fn manifest(&self, pkg: &Package) -> Result<Manifest> {
        let PackageResolution::Npm { name, version, .. } = pkg.resolved() else {
            return Err(FetchError::InvalidPackageSpec(pkg.from().clone()));
        };
        self.registry
            .packument(name)
            .and_then(|packument| {
                packument
                    .versions
                    .get(version)
                    .map(|metadata| metadata.manifest.clone())
            })
            .ok_or_else(|| FetchError::MissingVersion(name.clone(), version.clone()))
    }

    async fn tarball(&self, pkg: &Package, dest: &Path) -> Result<()> {
        let PackageResolution::Npm { name, version, .. } = pkg.resolved() else {
            return Err(FetchError::InvalidPackageSpec(pkg.from().clone()));
        };
        let manifest = self.manifest(pkg).await?;
        let mut entries = vec![(
            "package.json".to_string(),
            serde_json::to_vec_pretty(&manifest)?,
        )];
        entries.extend(self.registry.files(name, &version.to_string()));
        archive::pack_entries(&entries, dest)
    }
}
