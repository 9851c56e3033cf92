use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::error::{InstallerError, IoContext};

/// An exclusive advisory lock on an install location, keyed by `(dir, name)`
/// and held as `dir/{name}.lock` containing the holder's PID. Atomic
/// `create_new` makes acquisition race-free across processes.
#[derive(Debug)]
pub struct InstallLock {
    lock_path: PathBuf,
}

impl InstallLock {
    /// Acquire the lock, retrying with exponential backoff in case another
    /// install is just finishing up.
    pub async fn acquire(dir: &Path, name: &str) -> Result<Self, InstallerError> {
        async_std::fs::create_dir_all(dir)
            .await
            .io_context(|| format!("Failed to create directory at {}.", dir.display()))?;
        let lock_path = dir.join(format!("{name}.lock"));
        let path = lock_path.clone();
        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(100))
            .with_max_times(4);
        (|| async { try_create(&path) })
            .retry(&backoff)
            .await
            .map_err(|source| InstallerError::LockFailed {
                path: lock_path.clone(),
                source,
            })?;
        tracing::debug!("Acquired install lock at {}.", lock_path.display());
        Ok(Self { lock_path })
    }

    /// Single-shot acquisition with no retries.
    pub async fn try_acquire(dir: &Path, name: &str) -> Result<Self, InstallerError> {
        async_std::fs::create_dir_all(dir)
            .await
            .io_context(|| format!("Failed to create directory at {}.", dir.display()))?;
        let lock_path = dir.join(format!("{name}.lock"));
        try_create(&lock_path).map_err(|source| InstallerError::LockFailed {
            path: lock_path.clone(),
            source,
        })?;
        Ok(Self { lock_path })
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }

    /// Release the lock. Consumes the guard; the file is gone afterwards.
    pub async fn release(self) -> Result<(), InstallerError> {
        async_std::fs::remove_file(&self.lock_path)
            .await
            .io_context(|| {
                format!(
                    "Failed to release install lock at {}.",
                    self.lock_path.display()
                )
            })?;
        tracing::debug!("Released install lock at {}.", self.lock_path.display());
        Ok(())
    }
}

fn try_create(path: &Path) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    write!(file, "{}", std::process::id())?;
    Ok(())
}
