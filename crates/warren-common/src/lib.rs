//! Shared types for package manifests, packuments, and pinned dependency
//! trees, as consumed by the rest of the Warren workspace.

pub use manifest::Manifest;
pub use packument::{Dist, Packument, VersionMetadata};
pub use pinned::{PinnedNode, PinnedTree};

mod manifest;
mod packument;
mod pinned;
