use std::path::{Path, PathBuf};
use std::sync::Arc;

use url::Url;
use warren_common::Manifest;
use warren_spec::{PackageSpec, SpecKind};

use crate::error::{FetchError, Result};
use crate::package::Package;
use crate::resolver::{PackageResolution, PackageResolver};
use crate::sources::{DirSource, DummySource, PackageSource, RegistrySource, TarballSource};

/// Build a new [`Depot`] with specified options.
#[derive(Clone, Debug, Default)]
pub struct DepotOpts {
    base_dir: Option<PathBuf>,
    default_tag: Option<String>,
    registry: Option<Url>,
    registry_source: Option<Arc<dyn PackageSource>>,
    git_source: Option<Arc<dyn PackageSource>>,
    remote_source: Option<Arc<dyn PackageSource>>,
}

impl DepotOpts {
    pub fn new() -> Self {
        Default::default()
    }

    /// Base directory to use for resolving relative paths. Defaults to `"."`.
    pub fn base_dir(mut self, base_dir: impl AsRef<Path>) -> Self {
        self.base_dir = Some(PathBuf::from(base_dir.as_ref()));
        self
    }

    /// Default dist-tag to use when resolving package versions. Defaults to
    /// `latest`.
    pub fn default_tag(mut self, default_tag: impl AsRef<str>) -> Self {
        self.default_tag = Some(default_tag.as_ref().into());
        self
    }

    /// Registry used for registry-style specifiers.
    ///
    /// Defaults to `https://registry.npmjs.org`.
    pub fn registry(mut self, registry: Url) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replace the registry-backed source entirely, e.g. with a
    /// [`crate::MemorySource`] for hermetic installs.
    pub fn registry_source(mut self, source: Arc<dyn PackageSource>) -> Self {
        self.registry_source = Some(source);
        self
    }

    /// Provide a source for git and hosted (`owner/repo`) specifiers. There
    /// is no bundled one.
    pub fn git_source(mut self, source: Arc<dyn PackageSource>) -> Self {
        self.git_source = Some(source);
        self
    }

    /// Provide a source for remote tarball URLs. There is no bundled one.
    pub fn remote_source(mut self, source: Arc<dyn PackageSource>) -> Self {
        self.remote_source = Some(source);
        self
    }

    /// Build a new [`Depot`] from this options object.
    pub fn build(self) -> Depot {
        let registry = self.registry.unwrap_or_else(|| {
            "https://registry.npmjs.org/"
                .parse()
                .expect("default registry URL is valid")
        });
        Depot {
            resolver: PackageResolver {
                base_dir: self.base_dir.unwrap_or_else(|| PathBuf::from(".")),
                default_tag: self.default_tag.unwrap_or_else(|| "latest".into()),
            },
            registry_source: self
                .registry_source
                .unwrap_or_else(|| Arc::new(RegistrySource::new(registry))),
            dir_source: Arc::new(DirSource::new()),
            tarball_source: Arc::new(TarballSource::new()),
            git_source: self.git_source,
            remote_source: self.remote_source,
        }
    }
}

/// Toplevel client for resolving specs into concrete [`Package`]s and
/// fetching their tarballs.
#[derive(Clone, Debug)]
pub struct Depot {
    resolver: PackageResolver,
    registry_source: Arc<dyn PackageSource>,
    dir_source: Arc<dyn PackageSource>,
    tarball_source: Arc<dyn PackageSource>,
    git_source: Option<Arc<dyn PackageSource>>,
    remote_source: Option<Arc<dyn PackageSource>>,
}

impl Default for Depot {
    fn default() -> Self {
        DepotOpts::new().build()
    }
}

impl Depot {
    /// Creates a new `Depot` with default settings. To configure it, use
    /// [`DepotOpts`].
    pub fn new() -> Self {
        Default::default()
    }

    /// Resolve a string spec (e.g. `foo@^1.2.3`, `./some/dir`) to a
    /// [`Package`] that can be used for further operations.
    pub async fn resolve(&self, spec: impl AsRef<str>) -> Result<Package> {
        let spec = spec.as_ref().parse()?;
        self.resolve_spec(spec).await
    }

    /// Resolve an already-parsed spec to a [`Package`].
    pub async fn resolve_spec(&self, spec: PackageSpec) -> Result<Package> {
        let source = self.pick_source(&spec)?;
        let name = source.name(&spec, &self.resolver.base_dir).await?;
        self.resolver.resolve(name, spec, source).await
    }

    /// Creates a "resolved" package from a plain [`Manifest`]. This is how
    /// the root project itself gets a package record.
    pub fn dummy_from_manifest(manifest: Manifest, path: impl AsRef<Path>) -> Package {
        let path = path.as_ref().to_path_buf();
        let name = manifest.name.clone().unwrap_or_else(|| "root".to_string());
        Package {
            from: PackageSpec::Dir { path: path.clone() },
            resolved: PackageResolution::Dir {
                name: name.clone(),
                version: manifest.version.clone(),
                path,
            },
            base_dir: PathBuf::from("."),
            source: Arc::new(DummySource(manifest)),
            name,
        }
    }

    /// Creates a package record for a package found already installed on
    /// disk. Its resolution reports the installed version so placement and
    /// diffing can compare it against freshly resolved packages.
    pub fn installed(manifest: &Manifest, name: &str, path: &Path) -> Package {
        let resolved = match &manifest.version {
            Some(version) => PackageResolution::Npm {
                name: name.to_string(),
                version: version.clone(),
                tarball: None,
            },
            None => PackageResolution::Dir {
                name: name.to_string(),
                version: None,
                path: path.to_path_buf(),
            },
        };
        Package {
            from: PackageSpec::Dir {
                path: path.to_path_buf(),
            },
            resolved,
            base_dir: PathBuf::from("."),
            source: Arc::new(DummySource(manifest.clone())),
            name: name.to_string(),
        }
    }

    fn pick_source(&self, spec: &PackageSpec) -> Result<Arc<dyn PackageSource>> {
        use PackageSpec::*;
        match spec {
            Npm { .. } => Ok(self.registry_source.clone()),
            Dir { .. } => Ok(self.dir_source.clone()),
            Tarball { .. } => Ok(self.tarball_source.clone()),
            Remote { .. } => self
                .remote_source
                .clone()
                .ok_or(FetchError::NoSource(SpecKind::Remote)),
            Git(..) | Hosted { .. } => self
                .git_source
                .clone()
                .ok_or_else(|| FetchError::NoSource(spec.kind())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{MemoryRegistry, MemorySource};
    use pretty_assertions::assert_eq;

    fn depot_with(registry: &MemoryRegistry) -> Depot {
        DepotOpts::new()
            .registry_source(Arc::new(MemorySource::new(registry.clone())))
            .build()
    }

    #[async_std::test]
    async fn resolves_range_through_memory_registry() {
        let registry = MemoryRegistry::new();
        registry.publish_json(r#"{ "name": "a", "version": "1.0.0" }"#);
        registry.publish_json(r#"{ "name": "a", "version": "1.4.2" }"#);
        let depot = depot_with(&registry);
        let package = depot.resolve("a@^1.0.0").await.unwrap();
        assert_eq!(package.name(), "a");
        assert_eq!(package.resolved().ident(), "1.4.2");
        let manifest = package.manifest().await.unwrap();
        assert_eq!(manifest.version, Some("1.4.2".parse().unwrap()));
    }

    #[async_std::test]
    async fn unknown_package_is_not_found() {
        let depot = depot_with(&MemoryRegistry::new());
        let err = depot.resolve("ghost@^1.0.0").await.unwrap_err();
        assert!(matches!(err, FetchError::PackageNotFound(_)));
    }

    #[async_std::test]
    async fn git_specs_require_an_injected_source() {
        let depot = depot_with(&MemoryRegistry::new());
        let err = depot.resolve("github:foo/bar").await.unwrap_err();
        assert!(matches!(err, FetchError::NoSource(SpecKind::Hosted)));
    }

    #[async_std::test]
    async fn fetched_tarball_extracts_to_package_contents() {
        let registry = MemoryRegistry::new();
        registry.publish_with_files(
            serde_json::from_str(r#"{ "name": "b", "version": "2.0.0" }"#).unwrap(),
            vec![("index.js".into(), b"exports.ok = true;".to_vec())],
        );
        let depot = depot_with(&registry);
        let package = depot.resolve("b@2.0.0").await.unwrap();

        let work = tempfile::tempdir().unwrap();
        let tarball = work.path().join("b.tgz");
        package.fetch_to(&tarball).await.unwrap();

        use crate::extract::{Extractor, TarExtractor};
        let dest = work.path().join("unpacked");
        TarExtractor.extract(&tarball, &dest).await.unwrap();
        assert!(dest.join("index.js").exists());
        assert!(dest.join("package.json").exists());
    }
}
