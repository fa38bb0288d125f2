//! Advisory lock on an installation directory.
//!
//! Installs into the same directory from several processes must be
//! serialized by the caller; [`DirectoryLock`] is the lock they share.

use fs4::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Lock file created inside the installation directory.
pub const LOCK_FILE: &str = ".jem.lock";

/// Failure to take the directory lock.
#[derive(Error, Debug)]
#[error("failed to lock '{}': {source}", .path.display())]
pub struct LockError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// An exclusive lock on an installation directory, released on drop.
#[derive(Debug)]
pub struct DirectoryLock {
    file: File,
    path: PathBuf,
}

impl DirectoryLock {
    /// Block until the lock on `dir` is acquired.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be created or locked.
    pub fn acquire(dir: impl AsRef<Path>) -> Result<Self, LockError> {
        let (file, path) = open_lock_file(dir.as_ref())?;
        file.lock_exclusive().map_err(|source| LockError {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "acquired directory lock");
        Ok(Self { file, path })
    }

    /// Acquire the lock on `dir` if no one else holds it.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be created, or locking fails
    /// for a reason other than contention.
    pub fn try_acquire(dir: impl AsRef<Path>) -> Result<Option<Self>, LockError> {
        let (file, path) = open_lock_file(dir.as_ref())?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file, path })),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(source) => Err(LockError { path, source }),
        }
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!(path = %self.path.display(), "released directory lock");
    }
}

fn open_lock_file(dir: &Path) -> Result<(File, PathBuf), LockError> {
    let path = dir.join(LOCK_FILE);
    fs::create_dir_all(dir).map_err(|source| LockError {
        path: path.clone(),
        source,
    })?;
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(&path)
        .map_err(|source| LockError {
            path: path.clone(),
            source,
        })?;
    Ok((file, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_is_exclusive_until_dropped() {
        let tmp = TempDir::new().unwrap();

        let held = DirectoryLock::acquire(tmp.path()).unwrap();
        assert_eq!(held.path(), tmp.path().join(LOCK_FILE));
        assert!(DirectoryLock::try_acquire(tmp.path()).unwrap().is_none());

        drop(held);
        assert!(DirectoryLock::try_acquire(tmp.path()).unwrap().is_some());
    }

    #[test]
    fn creates_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("new/home");
        let _lock = DirectoryLock::acquire(&dir).unwrap();
        assert!(dir.join(LOCK_FILE).exists());
    }
}
