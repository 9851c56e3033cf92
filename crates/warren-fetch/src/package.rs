use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use warren_common::Manifest;
use warren_spec::PackageSpec;

use crate::error::Result;
use crate::resolver::PackageResolution;
use crate::sources::PackageSource;

/// A resolved package. A concrete version has been determined from its
/// [`PackageSpec`] by the version resolver.
#[derive(Clone)]
pub struct Package {
    pub(crate) from: PackageSpec,
    pub(crate) name: String,
    pub(crate) resolved: PackageResolution,
    pub(crate) source: Arc<dyn PackageSource>,
    pub(crate) base_dir: PathBuf,
}

impl Package {
    /// Original package spec that this `Package` was resolved from.
    pub fn from(&self) -> &PackageSpec {
        &self.from
    }

    /// Name of the package, as it should be used in the dependency tree.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The [`PackageResolution`] that this `Package` was created from.
    pub fn resolved(&self) -> &PackageResolution {
        &self.resolved
    }

    /// Base directory that relative paths in the original spec were resolved
    /// against.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The package's manifest, from whichever source resolved it.
    pub async fn manifest(&self) -> Result<Manifest> {
        self.source.manifest(self).await
    }

    /// Materialize the package tarball at `dest`.
    pub async fn fetch_to(&self, dest: &Path) -> Result<()> {
        self.source.tarball(self, dest).await
    }
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.resolved)
    }
}
