//! Installing RubyGems archives without Ruby.
//!
//! This crate provides:
//! - Reading `.gem` archives and their nested `metadata.gz` / `data.tar.gz`
//! - Parsing gem metadata into a [`Gem`] descriptor
//! - Creating the `GEM_HOME` directory layout
//! - Installing archives one at a time or in batches, with a conflict policy
//! - Ruby spec files and load-root markers for downstream loaders

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod archive;
mod config;
mod gem;
mod install;
mod layout;
mod loader;
mod lock;
mod marker;
mod policy;
mod result;
mod specfile;

pub use archive::{
    is_valid_gem, validate_gem, ArchiveEntry, ArchiveError, ArchiveTree, EntryKind, GemArchive,
    DATA_ENTRY, GEM_EXTENSION, METADATA_ENTRY,
};
pub use config::{ConfigError, InstallerConfig, GEM_HOME_ENV};
pub use gem::{
    Dependency, DependencyKind, Gem, MetadataError, DEFAULT_BINDIR, DEFAULT_PLATFORM,
    DEFAULT_REQUIRE_PATH,
};
pub use install::{install_many, install_one, InstallListener, Installer};
pub use layout::{
    ensure_layout, GemHome, LayoutError, BIN_DIR, BUILD_INFO_DIR, CACHE_DIR, DOC_DIR,
    EXTENSIONS_DIR, GEMS_DIR, GEM_HOME_DIRS, SPECIFICATIONS_DIR, SPEC_EXT,
};
pub use loader::{GemRepository, RepositoryError};
pub use lock::{DirectoryLock, LockError, LOCK_FILE};
pub use marker::{write_markers, MarkerError, MARKER_CONTENT, MARKER_FILE};
pub use policy::{ConflictError, DuplicateBehavior, Resolution};
pub use result::{ErrorKind, InstallError, InstallResult};
pub use specfile::SpecFileError;
