use std::path::PathBuf;

use miette::Diagnostic;
use node_semver::Version;
use thiserror::Error;
use warren_spec::{PackageSpec, SpecKind};

/// Error type returned by all fetching and resolution calls.
#[derive(Debug, Error, Diagnostic)]
pub enum FetchError {
    /// Something went wrong while trying to parse a PackageSpec.
    #[error(transparent)]
    #[diagnostic(transparent)]
    PackageSpecError(#[from] warren_spec::PackageSpecError),

    /// The spec parsed fine, but nothing is wired up to serve it.
    #[error("No package source is configured for `{0}` specifiers.")]
    #[diagnostic(
        code(warren_fetch::no_source),
        help("Git and remote-tarball sources must be supplied by the embedding application.")
    )]
    NoSource(SpecKind),

    /// No matching version could be found for a given specifier. Make sure
    /// that the version, range, or dist-tag you requested actually exists.
    #[error("No matching `{name}` version found for spec `{spec}`.")]
    #[diagnostic(code(warren_fetch::no_matching_version))]
    NoVersion {
        name: String,
        spec: PackageSpec,
        versions: Vec<String>,
    },

    /// A given package exists, but the version that the specifier resolved to
    /// does not.
    #[error("Package for `{0}` was found, but resolved version `{1}` does not exist.")]
    #[diagnostic(code(warren_fetch::missing_version))]
    MissingVersion(String, Version),

    /// The registry has never heard of this package.
    #[error("Package `{0}` was not found in the registry.")]
    #[diagnostic(code(warren_fetch::package_not_found))]
    PackageNotFound(String),

    /// Failed to read a directory dependency.
    #[error("Failed to read directory dependency at {}.", .1.display())]
    #[diagnostic(code(warren_fetch::dir::read))]
    DirReadError(#[source] std::io::Error, PathBuf),

    /// Failed to extract a tarball while doing a certain IO operation.
    #[error("Failed to extract tarball while {1}{}", if let Some(path) = .2 {
        format!(" (file: {})", path.to_string_lossy())
    } else {
        "".to_string()
    })]
    #[diagnostic(code(warren_fetch::io::extract))]
    ExtractIoError(#[source] std::io::Error, String, Option<PathBuf>),

    /// A tarball that was expected to contain a manifest didn't.
    #[error("No package.json found inside tarball at {}.", .0.display())]
    #[diagnostic(code(warren_fetch::tarball::no_manifest))]
    NoManifestInTarball(PathBuf),

    /// A generic IO error. Refer to the error message for more details.
    #[error("{0}")]
    #[diagnostic(code(warren_fetch::io::generic))]
    IoError(String, #[source] std::io::Error),

    /// An IO error with no further context.
    #[error(transparent)]
    #[diagnostic(code(warren_fetch::io))]
    Io(#[from] std::io::Error),

    /// A generic serde error.
    #[error(transparent)]
    #[diagnostic(code(warren_fetch::serde))]
    SerdeError(#[from] serde_json::Error),

    /// Failed to parse a URL.
    #[error(transparent)]
    #[diagnostic(code(warren_fetch::bad_url))]
    UrlError(#[from] url::ParseError),

    /// The registry request itself failed.
    #[error("Registry request failed: {0}")]
    #[diagnostic(code(warren_fetch::request_error))]
    RequestError(#[from] reqwest::Error),

    /// The registry answered, but not with anything usable.
    #[error("Registry returned status {1} for `{0}`.")]
    #[diagnostic(code(warren_fetch::registry_status))]
    RegistryStatus(String, u16),

    /// There's no tarball URL in the package metadata. This is likely a bug
    /// in the registry.
    #[error("Package metadata for {0} is missing a tarball URL.")]
    #[diagnostic(code(warren_fetch::no_tarball))]
    NoTarball(String),

    /// The version resolver ran into a package spec it can't resolve against
    /// a registry document.
    #[error("Only version, range, and tag specifiers can be resolved against a registry, but got `{0}`.")]
    #[diagnostic(code(warren_fetch::invalid_package_spec))]
    InvalidPackageSpec(PackageSpec),

    /// Some unsupported operation happened on an already-installed package
    /// record. These records only exist for comparison purposes.
    #[error("Unsupported operation on an already-installed package: {0}")]
    #[diagnostic(code(warren_fetch::unsupported_installed_operation))]
    UnsupportedInstalledOperation(String),

    /// A package that is required to declare a name didn't.
    #[error("Package at {} does not declare a name.", .0.display())]
    #[diagnostic(code(warren_fetch::missing_name))]
    MissingName(PathBuf),
}

/// The result type returned by calls to this library.
pub type Result<T> = std::result::Result<T, FetchError>;

pub trait IoContext {
    type T;

    fn io_context(self, context: impl FnOnce() -> String) -> Result<Self::T>;
}

impl<T> IoContext for std::result::Result<T, std::io::Error> {
    type T = T;

    fn io_context(self, context: impl FnOnce() -> String) -> Result<Self::T> {
        self.map_err(|e| FetchError::IoError(context(), e))
    }
}
