//! Per-archive install outcomes.

use crate::archive::ArchiveError;
use crate::gem::{Gem, MetadataError};
use crate::layout::LayoutError;
use crate::lock::LockError;
use crate::policy::ConflictError;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why an install (or a batch) failed.
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("invalid gem archive: {0}")]
    Archive(#[from] ArchiveError),

    #[error("failed to process the metadata: {0}")]
    Metadata(#[from] MetadataError),

    #[error("IO error at '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("conflict: {0}")]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Lock(#[from] LockError),
}

impl InstallError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The error category, without the details.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Archive(_) => ErrorKind::ArchiveFormat,
            Self::Metadata(_) => ErrorKind::Metadata,
            Self::Io { .. } | Self::Layout(_) | Self::Lock(_) => ErrorKind::Io,
            Self::Conflict(_) => ErrorKind::Conflict,
        }
    }
}

/// Broad categories of [`InstallError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The archive or one of its nested entries is missing or unreadable.
    ArchiveFormat,
    /// The gem metadata is missing required fields or is malformed.
    Metadata,
    /// A filesystem operation failed.
    Io,
    /// An existing artifact blocked the install under the `fail` policy.
    Conflict,
}

/// The outcome of installing one gem archive.
///
/// An install succeeded exactly when [`InstallResult::error`] is `None`.
#[derive(Debug)]
pub struct InstallResult {
    /// The `.gem` file that was installed.
    pub gem_file: PathBuf,

    /// The installation directory.
    pub install_dir: PathBuf,

    /// Parsed metadata, `None` if the install failed before it was read.
    pub gem: Option<Gem>,

    /// The failure that aborted the install.
    pub error: Option<InstallError>,

    /// Problems in best-effort steps and artifacts kept under the `skip` policy.
    pub warnings: Vec<String>,
}

impl InstallResult {
    pub(crate) fn new(gem_file: &Path, install_dir: &Path) -> Self {
        Self {
            gem_file: gem_file.to_path_buf(),
            install_dir: install_dir.to_path_buf(),
            gem: None,
            error: None,
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The error category, if the install failed.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(InstallError::kind)
    }
}
