//! The `GEM_HOME` directory layout.
//!
//! ```text
//! gem-home/
//! ├── bin/                       # Executables from every installed gem
//! ├── build_info/
//! ├── cache/                     # Copies of the installed .gem archives
//! ├── doc/
//! ├── extensions/
//! ├── gems/<full-name>/          # Exploded data.tar.gz payloads
//! └── specifications/            # <full-name>.gemspec files
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Executables directory.
pub const BIN_DIR: &str = "bin";

/// Build information directory.
pub const BUILD_INFO_DIR: &str = "build_info";

/// Cached archives directory.
pub const CACHE_DIR: &str = "cache";

/// Documentation directory.
pub const DOC_DIR: &str = "doc";

/// Native extensions directory.
pub const EXTENSIONS_DIR: &str = "extensions";

/// Exploded gem payloads directory.
pub const GEMS_DIR: &str = "gems";

/// Spec files directory.
pub const SPECIFICATIONS_DIR: &str = "specifications";

/// Spec file extension.
pub const SPEC_EXT: &str = "gemspec";

/// Every directory a gem home must contain.
pub const GEM_HOME_DIRS: [&str; 7] = [
    BIN_DIR,
    BUILD_INFO_DIR,
    CACHE_DIR,
    DOC_DIR,
    EXTENSIONS_DIR,
    GEMS_DIR,
    SPECIFICATIONS_DIR,
];

/// Failure to create one of the gem home directories.
#[derive(Error, Debug)]
#[error("failed to create directory '{}': {source}", .path.display())]
pub struct LayoutError {
    /// The directory that could not be created.
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Paths inside an installation directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GemHome {
    root: PathBuf,
}

impl GemHome {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create every directory in [`GEM_HOME_DIRS`] below `root`.
    ///
    /// Existing directories are left alone. Stops at the first directory that
    /// cannot be created; directories created before it are kept.
    ///
    /// # Errors
    ///
    /// Returns a [`LayoutError`] naming the directory that failed.
    pub fn ensure_layout(&self) -> Result<(), LayoutError> {
        for name in GEM_HOME_DIRS {
            let path = self.root.join(name);
            debug!(path = %path.display(), "ensuring directory");
            fs::create_dir_all(&path).map_err(|source| LayoutError { path, source })?;
        }
        Ok(())
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `cache/<file name of the archive>`.
    #[must_use]
    pub fn cache_path(&self, archive: &Path) -> PathBuf {
        let mut path = self.root.join(CACHE_DIR);
        if let Some(name) = archive.file_name() {
            path.push(name);
        }
        path
    }

    /// `specifications/<full name>.gemspec`.
    #[must_use]
    pub fn spec_path(&self, full_name: &str) -> PathBuf {
        self.root
            .join(SPECIFICATIONS_DIR)
            .join(format!("{full_name}.{SPEC_EXT}"))
    }

    /// `gems/<full name>`.
    #[must_use]
    pub fn gem_dir(&self, full_name: &str) -> PathBuf {
        self.root.join(GEMS_DIR).join(full_name)
    }

    /// The executables directory for a gem's `bindir`.
    #[must_use]
    pub fn bin_dir(&self, bindir: &str) -> PathBuf {
        self.root.join(bindir)
    }
}

/// Create the gem home layout below `root`. See [`GemHome::ensure_layout`].
///
/// # Errors
///
/// Returns a [`LayoutError`] naming the directory that failed.
pub fn ensure_layout(root: impl AsRef<Path>) -> Result<(), LayoutError> {
    GemHome::new(root.as_ref()).ensure_layout()
}
