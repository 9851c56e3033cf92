use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use warren_common::{Manifest, Packument};
use warren_spec::PackageSpec;

use crate::archive;
use crate::error::{FetchError, Result};
use crate::package::Package;
use crate::resolver::PackageResolution;
use crate::sources::PackageSource;

/// Serves local-folder dependencies. The "tarball" for a folder is packed on
/// the fly, so downstream extraction works the same for every source.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirSource;

impl DirSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PackageSource for DirSource {
    async fn name(&self, spec: &PackageSpec, base_dir: &Path) -> Result<String> {
        let path = spec_path(spec, base_dir)?;
        let manifest = read_manifest(&path)?;
        if let Some(name) = manifest.name {
            Ok(name)
        } else {
            path.file_name()
                .map(|name| name.to_string_lossy().to_string())
                .ok_or_else(|| FetchError::MissingName(path.clone()))
        }
    }

    async fn packument(&self, spec: &PackageSpec, base_dir: &Path) -> Result<Arc<Packument>> {
        let path = spec_path(spec, base_dir)?;
        Ok(Arc::new(Packument::from_manifest(&read_manifest(&path)?)))
    }

    async fn manifest(&self, pkg: &Package) -> Result<Manifest> {
        match pkg.resolved() {
            PackageResolution::Dir { path, .. } => read_manifest(path),
            _ => Err(FetchError::InvalidPackageSpec(pkg.from().clone())),
        }
    }

    async fn tarball(&self, pkg: &Package, dest: &Path) -> Result<()> {
        let PackageResolution::Dir { path, .. } = pkg.resolved() else {
            return Err(FetchError::InvalidPackageSpec(pkg.from().clone()));
        };
        let path = path.clone();
        let dest = dest.to_owned();
        async_std::task::spawn_blocking(move || archive::pack_dir(&path, &dest)).await
    }
}

fn spec_path(spec: &PackageSpec, base_dir: &Path) -> Result<PathBuf> {
    match spec {
        PackageSpec::Dir { path } => Ok(dunce::canonicalize(base_dir.join(path))
            .map_err(|e| FetchError::DirReadError(e, base_dir.join(path)))?),
        _ => Err(FetchError::InvalidPackageSpec(spec.clone())),
    }
}

fn read_manifest(dir: &Path) -> Result<Manifest> {
    let manifest_path = dir.join("package.json");
    Manifest::from_path(&manifest_path).map_err(|e| FetchError::DirReadError(e, manifest_path))
}
