//! File-based locking for single-writer safety.
//!
//! Cross-platform (fs2) advisory lock, exclusive-only: one process owns the
//! store file for the lifetime of a session. The lock target is the store
//! file itself — no sidecar lock file. Released on Drop.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::errors::StoreError;

pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // fs2 unlock errors on drop are ignored deliberately.
        let _ = self.file.unlock();
    }
}

/// Try to acquire the exclusive advisory lock on `path`.
/// Fails with `StoreError::Lock` if another session holds it.
pub fn try_acquire_exclusive(path: &Path) -> Result<LockGuard> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .with_context(|| format!("open for lock {}", path.display()))?;
    file.try_lock_exclusive().map_err(|e| {
        StoreError::Lock(format!(
            "exclusive lock unavailable for {}: {}",
            path.display(),
            e
        ))
    })?;
    Ok(LockGuard {
        file,
        path: path.to_path_buf(),
    })
}
