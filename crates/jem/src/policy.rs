//! What to do when an install would overwrite an existing artifact.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Conflict policy applied to the cached archive, the spec file and the
/// exploded gem directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateBehavior {
    /// Replace existing artifacts.
    #[default]
    Overwrite,
    /// Keep existing artifacts and treat the step as done.
    Skip,
    /// Abort the install with a [`ConflictError`].
    Fail,
}

/// An existing artifact blocked an install under [`DuplicateBehavior::Fail`].
#[derive(Error, Debug)]
#[error("'{}' already exists", .path.display())]
pub struct ConflictError {
    pub path: PathBuf,
}

/// Outcome of checking one artifact path against the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing is in the way.
    Create,
    /// Something is in the way and will be replaced.
    Replace,
    /// Something is in the way and stays.
    Keep,
}

impl DuplicateBehavior {
    /// Decide how to treat `path` before writing it.
    ///
    /// # Errors
    ///
    /// Returns a [`ConflictError`] if the path exists and the policy is `Fail`.
    pub fn resolve(self, path: &Path) -> Result<Resolution, ConflictError> {
        // symlink_metadata so a dangling link still counts as occupied
        if path.symlink_metadata().is_err() {
            return Ok(Resolution::Create);
        }
        match self {
            Self::Overwrite => Ok(Resolution::Replace),
            Self::Skip => Ok(Resolution::Keep),
            Self::Fail => Err(ConflictError {
                path: path.to_path_buf(),
            }),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overwrite => "overwrite",
            Self::Skip => "skip",
            Self::Fail => "fail",
        }
    }
}

impl std::fmt::Display for DuplicateBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DuplicateBehavior {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "skip" => Ok(Self::Skip),
            "fail" => Ok(Self::Fail),
            _ => Err(format!(
                "unknown duplicate behavior '{s}', expected one of: overwrite, skip, fail"
            )),
        }
    }
}
