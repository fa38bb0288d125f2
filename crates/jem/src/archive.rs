//! Reading `.gem` archives.
//!
//! A gem is a plain tar file holding (at least) two entries:
//! ```text
//! sample-1.0.gem
//! ├── metadata.gz     # gzip-compressed YAML Gem::Specification
//! └── data.tar.gz     # gzip-compressed tar of the gem's files
//! ```
//! Both levels are read into an [`ArchiveTree`], a path-indexed set of entries
//! that the installer works with independently of the `tar` crate's types.

use flate2::read::GzDecoder;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Name of the compressed metadata entry in the outer archive.
pub const METADATA_ENTRY: &str = "metadata.gz";

/// Name of the compressed payload entry in the outer archive.
pub const DATA_ENTRY: &str = "data.tar.gz";

/// File extension of gem archives.
pub const GEM_EXTENSION: &str = "gem";

/// Errors that can occur while reading an archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("failed to open archive '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unreadable archive: {0}")]
    Io(#[from] io::Error),

    #[error("corrupt '{entry}' entry: {source}")]
    Corrupt {
        entry: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("archive is missing the '{0}' entry")]
    MissingEntry(&'static str),

    #[error("archive entry escapes its root: {0}")]
    UnsafePath(PathBuf),

    #[error("not a .gem file: {0}")]
    NotAGem(PathBuf),
}

/// The kind of an archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// A single entry of an [`ArchiveTree`].
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    path: PathBuf,
    kind: EntryKind,
    mode: u32,
    data: Vec<u8>,
}

impl ArchiveEntry {
    /// Path of the entry relative to the archive root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Permission bits recorded in the archive header.
    #[must_use]
    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// The entry's content; empty for directories.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// A reader over the entry's content.
    #[must_use]
    pub fn reader(&self) -> impl Read + '_ {
        self.data.as_slice()
    }
}

/// A tar archive loaded into memory and indexed by normalized path.
#[derive(Debug, Clone, Default)]
pub struct ArchiveTree {
    entries: BTreeMap<PathBuf, ArchiveEntry>,
}

impl ArchiveTree {
    /// Read an uncompressed tar stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is not a valid tar or an entry path
    /// would escape the archive root.
    pub fn from_tar(reader: impl Read) -> Result<Self, ArchiveError> {
        let mut archive = tar::Archive::new(reader);
        let mut entries = BTreeMap::new();

        for entry in archive.entries()? {
            let mut entry = entry?;
            let entry_type = entry.header().entry_type();

            let kind = if entry_type.is_dir() {
                EntryKind::Directory
            } else if entry_type.is_file() {
                EntryKind::File
            } else {
                warn!(
                    path = %entry.path()?.display(),
                    entry_type = ?entry_type,
                    "skipping link or special archive entry"
                );
                continue;
            };

            let raw_path = entry.path()?.into_owned();
            let Some(path) = normalize_entry_path(&raw_path)? else {
                continue;
            };

            let mode = entry.header().mode().unwrap_or(0o644);
            let mut data = Vec::new();
            if kind == EntryKind::File {
                entry.read_to_end(&mut data)?;
            }

            entries.insert(
                path.clone(),
                ArchiveEntry {
                    path,
                    kind,
                    mode,
                    data,
                },
            );
        }

        Ok(Self { entries })
    }

    /// Read a gzip-compressed tar stream.
    ///
    /// # Errors
    ///
    /// Returns an error if decompression fails or the tar is invalid.
    pub fn from_tar_gz(reader: impl Read) -> Result<Self, ArchiveError> {
        Self::from_tar(GzDecoder::new(reader))
    }

    /// Look up an entry by path. Leading `/` and `./` are ignored.
    #[must_use]
    pub fn get(&self, path: impl AsRef<Path>) -> Option<&ArchiveEntry> {
        let path = normalize_entry_path(path.as_ref()).ok()??;
        self.entries.get(&path)
    }

    /// All entries in path order.
    pub fn entries(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.values()
    }

    /// Regular files below `dir`, paired with their path relative to `dir`.
    pub fn files_under<'a>(
        &'a self,
        dir: &'a Path,
    ) -> impl Iterator<Item = (&'a Path, &'a ArchiveEntry)> + 'a {
        self.entries.values().filter_map(move |entry| {
            let relative = entry.path.strip_prefix(dir).ok()?;
            (entry.is_file() && !relative.as_os_str().is_empty()).then_some((relative, entry))
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write every entry below `dest`, creating directories as needed.
    ///
    /// Returns the number of files written.
    ///
    /// # Errors
    ///
    /// Returns the first filesystem error encountered.
    pub fn explode(&self, dest: &Path) -> io::Result<usize> {
        fs::create_dir_all(dest)?;

        let mut written = 0;
        for entry in self.entries.values() {
            let target = dest.join(&entry.path);
            match entry.kind {
                EntryKind::Directory => fs::create_dir_all(&target)?,
                EntryKind::File => {
                    write_entry(entry, &target)?;
                    written += 1;
                }
            }
        }

        Ok(written)
    }
}

/// Write a file entry to `target`, applying its recorded permissions.
pub(crate) fn write_entry(entry: &ArchiveEntry, target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(target, &entry.data)?;
    set_mode(target, entry.mode)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    // Never drop the owner's own read/write bits
    let mode = (mode & 0o777) | 0o600;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Normalize an archive path to a relative path.
///
/// Root and `.` components are dropped. A `..` component is rejected so that
/// no entry can be written outside the extraction directory. Returns `None`
/// for paths that normalize to nothing.
pub(crate) fn normalize_entry_path(path: &Path) -> Result<Option<PathBuf>, ArchiveError> {
    let mut result = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::CurDir => {}
            Component::ParentDir => return Err(ArchiveError::UnsafePath(path.to_path_buf())),
            Component::Normal(part) => result.push(part),
        }
    }

    if result.as_os_str().is_empty() {
        return Ok(None);
    }

    Ok(Some(result))
}

/// An opened `.gem` archive.
#[derive(Debug)]
pub struct GemArchive {
    path: PathBuf,
    outer: ArchiveTree,
}

impl GemArchive {
    /// Open and index the outer tar of a gem.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or is not a tar archive.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| ArchiveError::Open {
            path: path.clone(),
            source,
        })?;
        let outer = ArchiveTree::from_tar(BufReader::new(file))?;
        Ok(Self { path, outer })
    }

    /// Path the archive was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The outer archive's entries.
    #[must_use]
    pub fn outer(&self) -> &ArchiveTree {
        &self.outer
    }

    /// Raw (still gzip-compressed) bytes of `metadata.gz`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry is missing.
    pub fn metadata_gz(&self) -> Result<&[u8], ArchiveError> {
        self.required(METADATA_ENTRY).map(ArchiveEntry::bytes)
    }

    /// Decompress and index `data.tar.gz`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry is missing or is not a gzip-compressed tar.
    pub fn data(&self) -> Result<ArchiveTree, ArchiveError> {
        let entry = self.required(DATA_ENTRY)?;
        ArchiveTree::from_tar_gz(entry.reader()).map_err(|e| match e {
            ArchiveError::Io(source) => ArchiveError::Corrupt {
                entry: DATA_ENTRY,
                source,
            },
            other => other,
        })
    }

    fn required(&self, name: &'static str) -> Result<&ArchiveEntry, ArchiveError> {
        self.outer
            .get(name)
            .filter(|entry| entry.is_file())
            .ok_or(ArchiveError::MissingEntry(name))
    }
}

/// Check that `path` names a readable gem archive.
///
/// The file must have a `.gem` extension, be a tar archive, and contain both
/// [`METADATA_ENTRY`] and [`DATA_ENTRY`].
///
/// # Errors
///
/// Returns the first check that failed.
pub fn validate_gem(path: impl AsRef<Path>) -> Result<(), ArchiveError> {
    let path = path.as_ref();
    debug!(path = %path.display(), "validating gem");

    if !path.extension().is_some_and(|ext| ext == GEM_EXTENSION) {
        return Err(ArchiveError::NotAGem(path.to_path_buf()));
    }

    let archive = GemArchive::open(path)?;
    archive.required(METADATA_ENTRY)?;
    archive.required(DATA_ENTRY)?;
    Ok(())
}

/// Returns true if [`validate_gem`] accepts `path`.
#[must_use]
pub fn is_valid_gem(path: impl AsRef<Path>) -> bool {
    validate_gem(path).is_ok()
}
