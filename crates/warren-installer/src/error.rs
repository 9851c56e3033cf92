use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::plan::Phase;

#[derive(Debug, Error, Diagnostic)]
pub enum InstallerError {
    /// No package.json at a location that requires one.
    #[error("No manifest found at {}.", .0.display())]
    #[diagnostic(code(warren_installer::manifest_missing))]
    ManifestMissing(PathBuf),

    /// A manifest exists but could not be read or parsed.
    #[error("Failed to read manifest at {}.", .0.display())]
    #[diagnostic(code(warren_installer::manifest_read_error))]
    ManifestReadError(PathBuf, #[source] std::io::Error),

    /// Generic package spec error.
    #[error(transparent)]
    #[diagnostic(transparent)]
    SpecError(#[from] warren_spec::PackageSpecError),

    /// Generic error returned while resolving or fetching packages.
    #[error(transparent)]
    #[diagnostic(transparent)]
    FetchError(#[from] warren_fetch::FetchError),

    /// Resolution failed somewhere down the tree. Carries the chain of
    /// packages that led to the failing dependency.
    #[error("Failed to resolve `{spec}` (required via {chain}).")]
    #[diagnostic(code(warren_installer::resolve_failed))]
    ResolveFailed {
        spec: String,
        chain: String,
        #[source]
        source: warren_fetch::FetchError,
    },

    /// A lifecycle script failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    ScriptError(#[from] warren_script::ScriptError),

    /// Generic IO error with context.
    #[error("{0}")]
    #[diagnostic(code(warren_installer::io_error))]
    IoError(String, #[source] std::io::Error),

    /// Generic IO error.
    #[error(transparent)]
    #[diagnostic(code(warren_installer::io))]
    Io(#[from] std::io::Error),

    /// Error parsing a lockfile.
    #[error("Failed to parse lockfile.")]
    #[diagnostic(code(warren_installer::lockfile_parse_error))]
    LockfileParseError(#[source] serde_json::Error),

    /// A lockfile asked for two copies of the same name in one spot.
    #[error("Lockfile places two copies of `{name}` at `{at}`.")]
    #[diagnostic(code(warren_installer::lockfile_conflict))]
    LockfileConflict { name: String, at: String },

    /// Placement found a conflicting occupant at the only legal slot.
    #[error("Cannot place `{name}` at `{at}`: a conflicting copy already occupies that slot.")]
    #[diagnostic(code(warren_installer::placement_conflict))]
    PlacementConflict { name: String, at: String },

    /// Could not take the install lock.
    #[error("Could not acquire install lock at {}. Is another install running?", .path.display())]
    #[diagnostic(
        code(warren_installer::lock_failed),
        help("If no other install is running, delete the lock file and retry.")
    )]
    LockFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A node exists in the arena but isn't reachable from the root.
    #[error("Node `{0}` is not attached to the tree root.")]
    #[diagnostic(code(warren_installer::validate::detached))]
    ValidationDetached(String),

    /// Parent and child disagree about their relationship.
    #[error("Node `{child}` disagrees with its parent `{parent}` about its place in the tree.")]
    #[diagnostic(code(warren_installer::validate::parent_mismatch))]
    ValidationParentMismatch { parent: String, child: String },

    /// A declared dependency has no satisfying ancestor-or-sibling.
    #[error("Dependency `{name}` of `{dependent}` is not satisfied anywhere in its ancestor chain.")]
    #[diagnostic(code(warren_installer::validate::unsatisfied))]
    ValidationUnsatisfied { dependent: String, name: String },

    /// A non-root node has an empty requiredby set.
    #[error("Node `{0}` is not required by any package.")]
    #[diagnostic(code(warren_installer::validate::unrequired))]
    ValidationUnrequired(String),

    /// The hierarchy loops back on itself.
    #[error("Cycle detected through node `{0}`.")]
    #[diagnostic(code(warren_installer::validate::cycle))]
    ValidationCycle(String),

    /// A phase entry failed. Carries the chain of packages between the root
    /// and the failing node for diagnostics.
    #[error("{phase} failed for `{package}` (via {chain}).")]
    #[diagnostic(code(warren_installer::phase_failed))]
    PhaseFailed {
        phase: Phase,
        package: String,
        chain: String,
        #[source]
        source: Box<InstallerError>,
    },
}

pub trait IoContext {
    type T;

    fn io_context(self, context: impl FnOnce() -> String) -> Result<Self::T, InstallerError>;
}

impl<T> IoContext for std::result::Result<T, std::io::Error> {
    type T = T;

    fn io_context(self, context: impl FnOnce() -> String) -> Result<Self::T, InstallerError> {
        self.map_err(|e| InstallerError::IoError(context(), e))
    }
}
