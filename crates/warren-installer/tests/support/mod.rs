use std::path::Path;
use std::sync::Arc;

use warren_fetch::{DepotOpts, MemoryRegistry, MemorySource};
use warren_installer::{Installer, InstallerOptions};

/// Writes a project directory with the given `package.json` contents.
pub fn project(dir: &Path, manifest: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("package.json"), manifest).unwrap();
}

/// An installer builder wired to an in-memory registry.
pub fn installer(root: &Path, registry: &MemoryRegistry) -> InstallerOptions {
    Installer::builder().root(root).depot(
        DepotOpts::new()
            .base_dir(root)
            .registry_source(Arc::new(MemorySource::new(registry.clone())))
            .build(),
    )
}
