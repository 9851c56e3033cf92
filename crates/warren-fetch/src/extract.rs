use std::path::Path;

use async_trait::async_trait;

use crate::archive;
use crate::error::Result;

/// Turns a fetched tarball into an unpacked package directory. The installer
/// only ever talks to this trait; swapping in a different archive format is
/// an embedder concern.
#[async_trait]
pub trait Extractor: std::fmt::Debug + Send + Sync {
    async fn extract(&self, tarball: &Path, dest: &Path) -> Result<()>;
}

/// Default extractor: gzipped tarballs with the conventional leading
/// `package/` component.
#[derive(Debug, Default, Clone, Copy)]
pub struct TarExtractor;

#[async_trait]
impl Extractor for TarExtractor {
    async fn extract(&self, tarball: &Path, dest: &Path) -> Result<()> {
        let tarball = tarball.to_owned();
        let dest = dest.to_owned();
        async_std::task::spawn_blocking(move || archive::extract_tgz(&tarball, &dest)).await
    }
}
