//! Installing gem archives into a gem home.
//!
//! Each archive goes through five steps:
//! 1. copy the `.gem` into `cache/`
//! 2. open the archive and parse `metadata.gz`
//! 3. write `specifications/<full-name>.gemspec` (best effort)
//! 4. explode `data.tar.gz` into `gems/<full-name>/`
//! 5. copy `<bindir>/*` into the gem home's `<bindir>/` (best effort)
//!
//! Failures in steps 1, 2 and 4 abort the archive's install. Failures in
//! steps 3 and 5 are logged and recorded as warnings on the result.

use crate::archive::{normalize_entry_path, write_entry, ArchiveError, ArchiveTree, GemArchive};
use crate::config::InstallerConfig;
use crate::gem::Gem;
use crate::layout::{GemHome, LayoutError};
use crate::lock::DirectoryLock;
use crate::marker::write_markers;
use crate::policy::{DuplicateBehavior, Resolution};
use crate::result::{InstallError, InstallResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Called after each archive of a batch.
pub trait InstallListener {
    /// Inspect a finished install. Return `false` to stop the batch.
    fn on_install(&mut self, result: &InstallResult) -> bool;
}

impl<F> InstallListener for F
where
    F: FnMut(&InstallResult) -> bool,
{
    fn on_install(&mut self, result: &InstallResult) -> bool {
        self(result)
    }
}

/// Installs gem archives into one installation directory.
#[derive(Debug, Clone)]
pub struct Installer {
    home: GemHome,
    policy: DuplicateBehavior,
    markers: bool,
}

impl Installer {
    /// An installer for `install_dir` with the default `overwrite` policy.
    #[must_use]
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            home: GemHome::new(install_dir),
            policy: DuplicateBehavior::default(),
            markers: false,
        }
    }

    #[must_use]
    pub fn from_config(config: &InstallerConfig) -> Self {
        Self::new(&config.install_dir)
            .with_policy(config.on_duplicate)
            .with_markers(config.markers)
    }

    #[must_use]
    pub fn with_policy(mut self, policy: DuplicateBehavior) -> Self {
        self.policy = policy;
        self
    }

    /// Write load-root markers after each successful install.
    #[must_use]
    pub fn with_markers(mut self, markers: bool) -> Self {
        self.markers = markers;
        self
    }

    #[must_use]
    pub fn home(&self) -> &GemHome {
        &self.home
    }

    #[must_use]
    pub fn policy(&self) -> DuplicateBehavior {
        self.policy
    }

    /// Create the gem home layout.
    ///
    /// # Errors
    ///
    /// Returns a [`LayoutError`] naming the directory that could not be created.
    pub fn ensure_layout(&self) -> Result<(), LayoutError> {
        self.home.ensure_layout()
    }

    /// Install every archive in order, continuing past failed archives.
    ///
    /// # Errors
    ///
    /// Fails only if the gem home layout cannot be created; per-archive
    /// failures are reported in the returned results.
    pub fn install_many<I, P>(&self, gems: I) -> Result<Vec<InstallResult>, InstallError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.install_many_with(gems, &mut |_: &InstallResult| true)
    }

    /// Like [`Installer::install_many`], reporting each result to `listener`.
    ///
    /// The batch stops early only when the listener returns `false`.
    ///
    /// # Errors
    ///
    /// Fails only if the gem home layout cannot be created.
    pub fn install_many_with<I, P, L>(
        &self,
        gems: I,
        listener: &mut L,
    ) -> Result<Vec<InstallResult>, InstallError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
        L: InstallListener + ?Sized,
    {
        self.ensure_layout()?;

        let mut results = Vec::new();
        for gem in gems {
            let result = self.install_one(gem.as_ref());
            let proceed = listener.on_install(&result);
            results.push(result);
            if !proceed {
                info!("install batch stopped by listener");
                break;
            }
        }
        Ok(results)
    }

    /// [`Installer::install_many`] while holding the installation directory's lock.
    ///
    /// # Errors
    ///
    /// Fails if the lock cannot be taken or the layout cannot be created.
    pub fn install_many_locked<I, P>(&self, gems: I) -> Result<Vec<InstallResult>, InstallError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let _lock = DirectoryLock::acquire(self.home.root())?;
        self.install_many(gems)
    }

    /// Install a single archive. The gem home layout must already exist.
    pub fn install_one(&self, gem_file: impl AsRef<Path>) -> InstallResult {
        let gem_file = gem_file.as_ref();
        let mut result = InstallResult::new(gem_file, self.home.root());

        if let Err(e) = self.install_steps(gem_file, &mut result) {
            error!(gem = %gem_file.display(), error = %e, "install failed");
            result.error = Some(e);
        }
        result
    }

    /// Install a single archive, returning its metadata or the failure.
    pub(crate) fn install_gem(&self, gem_file: &Path) -> Result<Gem, InstallError> {
        let mut result = InstallResult::new(gem_file, self.home.root());
        self.install_steps(gem_file, &mut result)
    }

    fn install_steps(&self, gem_file: &Path, result: &mut InstallResult) -> Result<Gem, InstallError> {
        self.cache_gem(gem_file, result)?;

        let archive = GemArchive::open(gem_file)?;
        let data = archive.data()?;
        let gem = Gem::from_metadata_gz(archive.metadata_gz()?)?;
        info!(name = %gem.name, version = %gem.version, "processed metadata");
        result.gem = Some(gem.clone());

        let full_name = gem.full_name();
        if self.policy == DuplicateBehavior::Fail {
            // Refuse before touching anything that belongs to this full name
            self.policy.resolve(&self.home.spec_path(&full_name))?;
            self.policy.resolve(&self.home.gem_dir(&full_name))?;
        }

        if let Err(e) = self.write_spec(&gem, result) {
            error!(gem = %full_name, error = %e, "could not write the gem specification");
            result
                .warnings
                .push(format!("specification not written: {e}"));
        }

        self.extract_data(&data, &full_name, result)?;

        match self.extract_executables(&data, &gem, result) {
            Ok(count) => debug!(gem = %full_name, count, "extracted executables"),
            Err(e) => {
                error!(gem = %full_name, error = %e, "could not extract the gem executables");
                result
                    .warnings
                    .push(format!("executables not extracted: {e}"));
            }
        }

        if self.markers {
            if let Err(e) = write_markers(&self.home, &gem) {
                error!(gem = %full_name, error = %e, "could not write load-root markers");
                result.warnings.push(format!("markers not written: {e}"));
            }
        }

        Ok(gem)
    }

    /// Step 1: keep a copy of the archive in `cache/`.
    fn cache_gem(&self, gem_file: &Path, result: &mut InstallResult) -> Result<(), InstallError> {
        let target = self.home.cache_path(gem_file);

        if self.policy == DuplicateBehavior::Overwrite && same_file(gem_file, &target) {
            debug!(path = %target.display(), "archive already lives in the cache");
            return Ok(());
        }
        if self.keeps(&target, result)? {
            return Ok(());
        }
        fs::copy(gem_file, &target).map_err(|e| InstallError::io(&target, e))?;
        debug!(path = %target.display(), "cached archive");
        Ok(())
    }

    /// Step 3: write the Ruby spec file.
    fn write_spec(&self, gem: &Gem, result: &mut InstallResult) -> Result<(), InstallError> {
        let target = self.home.spec_path(&gem.full_name());
        if self.keeps(&target, result)? {
            return Ok(());
        }
        fs::write(&target, gem.to_gemspec()).map_err(|e| InstallError::io(&target, e))
    }

    /// Step 4: explode the payload into `gems/<full-name>/`.
    fn extract_data(
        &self,
        data: &ArchiveTree,
        full_name: &str,
        result: &mut InstallResult,
    ) -> Result<(), InstallError> {
        let target = self.home.gem_dir(full_name);
        match self.policy.resolve(&target)? {
            Resolution::Keep => {
                keep_existing(&target, result);
                return Ok(());
            }
            Resolution::Replace => remove_existing(&target)?,
            Resolution::Create => {}
        }

        let written = data
            .explode(&target)
            .map_err(|e| InstallError::io(&target, e))?;
        debug!(path = %target.display(), files = written, "exploded gem data");
        Ok(())
    }

    /// Step 5: copy `<bindir>/**` from the payload into the gem home.
    fn extract_executables(
        &self,
        data: &ArchiveTree,
        gem: &Gem,
        result: &mut InstallResult,
    ) -> Result<usize, InstallError> {
        let bindir = normalize_entry_path(Path::new(&gem.bindir))?
            .ok_or_else(|| ArchiveError::UnsafePath(PathBuf::from(&gem.bindir)))?;
        let bin = self.home.root().join(&bindir);
        fs::create_dir_all(&bin).map_err(|e| InstallError::io(&bin, e))?;

        let mut copied = 0;
        for (relative, entry) in data.files_under(&bindir) {
            let target = bin.join(relative);
            if self.keeps(&target, result)? {
                continue;
            }
            write_entry(entry, &target).map_err(|e| InstallError::io(&target, e))?;
            copied += 1;
        }
        Ok(copied)
    }

    /// Apply the policy to a single file; true means leave the existing file alone.
    ///
    /// A replaced entry is removed first, so a symlink is replaced rather than
    /// written through.
    fn keeps(&self, target: &Path, result: &mut InstallResult) -> Result<bool, InstallError> {
        match self.policy.resolve(target)? {
            Resolution::Keep => {
                keep_existing(target, result);
                Ok(true)
            }
            Resolution::Replace => {
                remove_existing(target)?;
                Ok(false)
            }
            Resolution::Create => Ok(false),
        }
    }
}

fn keep_existing(path: &Path, result: &mut InstallResult) {
    warn!(path = %path.display(), "already exists, skipping");
    result
        .warnings
        .push(format!("kept existing '{}'", path.display()));
}

/// Remove whatever occupies `path` without following a symlink there.
fn remove_existing(path: &Path) -> Result<(), InstallError> {
    let metadata = path
        .symlink_metadata()
        .map_err(|e| InstallError::io(path, e))?;
    let removed = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.map_err(|e| InstallError::io(path, e))?;
    debug!(path = %path.display(), "removed existing entry");
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Install one archive into `install_dir`. The layout must already exist.
pub fn install_one(
    install_dir: impl Into<PathBuf>,
    gem_file: impl AsRef<Path>,
    policy: DuplicateBehavior,
) -> InstallResult {
    Installer::new(install_dir)
        .with_policy(policy)
        .install_one(gem_file)
}

/// Create the layout under `install_dir`, then install every archive in order.
///
/// # Errors
///
/// Fails only if the layout cannot be created.
pub fn install_many<I, P>(
    install_dir: impl Into<PathBuf>,
    gems: I,
    policy: DuplicateBehavior,
) -> Result<Vec<InstallResult>, InstallError>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    Installer::new(install_dir)
        .with_policy(policy)
        .install_many(gems)
}
