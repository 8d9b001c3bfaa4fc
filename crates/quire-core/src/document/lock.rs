//! Cross-process advisory locks for document read-modify-write cycles.
//!
//! A lock on `targets.md` is taken on the sibling file `targets.md.lock`.
//! The lock is released when the guard drops. Locks are not re-entrant:
//! never acquire the same document twice on one thread.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::error::{QuireError, QuireResult};

/// Exclusive lock guard for a single document or folder.
#[derive(Debug)]
pub struct DocumentLock {
    file: File,
    path: PathBuf,
}

impl DocumentLock {
    /// Block until the lock for `target` is held.
    pub fn acquire(target: &Path) -> QuireResult<Self> {
        Self::acquire_at(Self::lock_path_for(target))
    }

    /// Lock a whole folder (used for slug allocation).
    pub fn acquire_dir(dir: &Path) -> QuireResult<Self> {
        Self::acquire_at(dir.join(".lock"))
    }

    fn acquire_at(path: PathBuf) -> QuireResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)?;

        file.lock_exclusive().map_err(|e| {
            QuireError::lock(format!("Failed to lock {}: {}", path.display(), e))
        })?;

        debug!(path = %path.display(), "Acquired document lock");
        Ok(Self { file, path })
    }

    /// Sibling lock file for a document path.
    pub fn lock_path_for(target: &Path) -> PathBuf {
        let mut name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        target.with_file_name(name)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DocumentLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!(path = %self.path.display(), error = %e, "Failed to release document lock");
        }
    }
}
