use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use warren_common::{Manifest, Packument};
use warren_spec::PackageSpec;

use crate::archive;
use crate::error::{FetchError, IoContext, Result};
use crate::package::Package;
use crate::resolver::PackageResolution;
use crate::sources::PackageSource;

/// Serves local tarball files. Metadata comes from the `package.json` inside
/// the archive; fetching is a plain file copy.
#[derive(Debug, Default, Clone, Copy)]
pub struct TarballSource;

impl TarballSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PackageSource for TarballSource {
    async fn name(&self, spec: &PackageSpec, base_dir: &Path) -> Result<String> {
        let path = spec_path(spec, base_dir)?;
        let manifest = manifest_at(&path).await?;
        manifest.name.ok_or(FetchError::MissingName(path))
    }

    async fn packument(&self, spec: &PackageSpec, base_dir: &Path) -> Result<Arc<Packument>> {
        let path = spec_path(spec, base_dir)?;
        Ok(Arc::new(Packument::from_manifest(&manifest_at(&path).await?)))
    }

    async fn manifest(&self, pkg: &Package) -> Result<Manifest> {
        match pkg.resolved() {
            PackageResolution::Tarball { path, .. } => manifest_at(path).await,
            _ => Err(FetchError::InvalidPackageSpec(pkg.from().clone())),
        }
    }

    async fn tarball(&self, pkg: &Package, dest: &Path) -> Result<()> {
        let PackageResolution::Tarball { path, .. } = pkg.resolved() else {
            return Err(FetchError::InvalidPackageSpec(pkg.from().clone()));
        };
        async_std::fs::copy(path, dest).await.io_context(|| {
            format!(
                "Failed to copy tarball from {} to {}.",
                path.display(),
                dest.display()
            )
        })?;
        Ok(())
    }
}

async fn manifest_at(path: &Path) -> Result<Manifest> {
    let path = path.to_owned();
    async_std::task::spawn_blocking(move || archive::manifest_from_tgz(&path)).await
}

fn spec_path(spec: &PackageSpec, base_dir: &Path) -> Result<PathBuf> {
    match spec {
        PackageSpec::Tarball { path } => Ok(dunce::canonicalize(base_dir.join(path))
            .map_err(|e| FetchError::DirReadError(e, base_dir.join(path)))?),
        _ => Err(FetchError::InvalidPackageSpec(spec.clone())),
    }
}
