//! Package metadata resolution and tarball fetching: the seam between the
//! install planner and wherever packages actually come from.

pub use warren_spec::{PackageSpec, SpecKind, VersionSpec};

pub use client::{Depot, DepotOpts};
pub use error::{FetchError, IoContext, Result};
pub use extract::{Extractor, TarExtractor};
pub use package::Package;
pub use resolver::PackageResolution;
pub use sources::{
    DirSource, MemoryRegistry, MemorySource, PackageSource, RegistrySource, TarballSource,
};

mod archive;
mod client;
mod error;
mod extract;
mod package;
mod resolver;
mod sources;
