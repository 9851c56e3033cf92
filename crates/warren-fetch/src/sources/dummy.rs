use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use warren_common::{Manifest, Packument};
use warren_spec::PackageSpec;

use crate::error::{FetchError, Result};
use crate::package::Package;
use crate::sources::PackageSource;

/// Backs package records that never hit a real source: the root project and
/// already-installed packages read back off disk. Metadata is served from
/// the captured manifest; anything heavier is a bug in the caller.
#[derive(Debug, Clone)]
pub(crate) struct DummySource(pub(crate) Manifest);

#[async_trait]
impl PackageSource for DummySource {
    async fn name(&self, spec: &PackageSpec, _base_dir: &Path) -> Result<String> {
        self.0
            .name
            .clone()
            .or_else(|| spec.name().map(String::from))
            .ok_or_else(|| FetchError::MissingName(Path::new(".").to_path_buf()))
    }

    async fn packument(&self, _spec: &PackageSpec, _base_dir: &Path) -> Result<Arc<Packument>> {
        Ok(Arc::new(Packument::from_manifest(&self.0)))
    }

    async fn manifest(&self, _pkg: &Package) -> Result<Manifest> {
        Ok(self.0.clone())
    }

    async fn tarball(&self, _pkg: &Package, _dest: &Path) -> Result<()> {
        Err(FetchError::UnsupportedInstalledOperation("tarball".into()))
    }
}
