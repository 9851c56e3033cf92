use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use warren_common::{Manifest, Packument};
use warren_spec::PackageSpec;

use crate::error::Result;
use crate::package::Package;

pub use dir::DirSource;
pub use memory::{MemoryRegistry, MemorySource};
pub use registry::RegistrySource;
pub use tarball::TarballSource;

pub(crate) use dummy::DummySource;

mod dir;
mod dummy;
mod memory;
mod registry;
mod tarball;

/// Where package metadata and tarballs come from. One implementation per
/// specifier family; the network-backed ones can be swapped out wholesale by
/// the embedding application.
#[async_trait]
pub trait PackageSource: std::fmt::Debug + Send + Sync {
    /// Canonical name of the package `spec` refers to.
    async fn name(&self, spec: &PackageSpec, base_dir: &Path) -> Result<String>;

    /// Full version listing for the package `spec` refers to.
    async fn packument(&self, spec: &PackageSpec, base_dir: &Path) -> Result<Arc<Packument>>;

    /// Manifest for an already-resolved package.
    async fn manifest(&self, pkg: &Package) -> Result<Manifest>;

    /// Materialize the package tarball at `dest`.
    async fn tarball(&self, pkg: &Package, dest: &Path) -> Result<()>;
}
