//! A gem repository for marker-based loaders.
//!
//! Gems added here are installed with the `overwrite` policy and get
//! load-root markers, so a loader can serve their require paths straight
//! from the installation directory.

use crate::gem::Gem;
use crate::install::Installer;
use crate::layout::{GemHome, LayoutError};
use crate::marker::{write_markers, MarkerError};
use crate::result::InstallError;
use crate::specfile::SpecFileError;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{error, info};

/// Errors that can occur in a [`GemRepository`].
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Marker(#[from] MarkerError),

    #[error("failed to create temporary repository: {0}")]
    Temp(#[source] io::Error),

    #[error("failed to read spec file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid spec file '{}': {source}", .path.display())]
    SpecFile {
        path: PathBuf,
        #[source]
        source: SpecFileError,
    },
}

/// An installation directory that gems are added to one at a time.
#[derive(Debug)]
pub struct GemRepository {
    installer: Installer,
    // Keeps a temporary repository alive; removed on drop
    _temp: Option<TempDir>,
}

impl GemRepository {
    /// Use `dir` as the repository, creating the gem home layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the layout cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let installer = Installer::new(dir);
        installer.ensure_layout()?;
        Ok(Self {
            installer,
            _temp: None,
        })
    }

    /// A repository in a fresh temporary directory, deleted when dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or its layout cannot be created.
    pub fn temporary() -> Result<Self, RepositoryError> {
        let temp = tempfile::Builder::new()
            .prefix("jems")
            .tempdir()
            .map_err(RepositoryError::Temp)?;
        let mut repo = Self::open(temp.path())?;
        repo._temp = Some(temp);
        Ok(repo)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        self.installer.home().root()
    }

    #[must_use]
    pub fn home(&self) -> &GemHome {
        self.installer.home()
    }

    /// Install a gem and mark its load roots.
    ///
    /// # Errors
    ///
    /// Returns an error if the install fails or the markers cannot be written.
    pub fn add_gem(&self, gem_file: impl AsRef<Path>) -> Result<Gem, RepositoryError> {
        let gem_file = gem_file.as_ref();
        let gem = self.installer.install_gem(gem_file).map_err(|e| {
            error!(gem = %gem_file.display(), error = %e, "could not add gem");
            e
        })?;

        write_markers(self.home(), &gem)?;
        info!(gem = %gem, "added gem to repository");
        Ok(gem)
    }

    /// The gem's require paths that exist in this repository, in declaration order.
    #[must_use]
    pub fn load_paths(&self, gem: &Gem) -> Vec<PathBuf> {
        let root = self.home().gem_dir(&gem.full_name());
        gem.require_paths
            .iter()
            .map(|path| root.join(path))
            .filter(|path| path.is_dir())
            .collect()
    }

    /// Read back the spec file of an installed gem.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec file cannot be read or parsed.
    pub fn specification(&self, full_name: &str) -> Result<Gem, RepositoryError> {
        let path = self.home().spec_path(full_name);
        let content = std::fs::read_to_string(&path).map_err(|source| RepositoryError::Read {
            path: path.clone(),
            source,
        })?;
        Gem::from_gemspec(&content).map_err(|source| RepositoryError::SpecFile { path, source })
    }
}
