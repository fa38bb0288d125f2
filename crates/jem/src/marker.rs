//! Load-root marker files for installed gems.
//!
//! A loader that serves gems out of an installation directory finds load
//! roots by looking for [`MARKER_FILE`]: one sits in `gems/<full-name>/` and
//! one in each of the gem's require paths below it.

use crate::archive::normalize_entry_path;
use crate::gem::Gem;
use crate::layout::GemHome;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Name of the marker file.
pub const MARKER_FILE: &str = ".jrubydir";

/// Content written to every marker file.
pub const MARKER_CONTENT: &[u8] = b".";

/// Errors that can occur while writing markers.
#[derive(Error, Debug)]
pub enum MarkerError {
    #[error("failed to write marker '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("require path '{0}' escapes the gem directory")]
    UnsafeRequirePath(String),
}

/// Write markers for an installed gem.
///
/// Require paths that do not exist in the installed payload are skipped.
/// Returns the marker files written.
///
/// # Errors
///
/// Returns an error if the gem directory is missing, a require path points
/// outside it, or a marker cannot be written.
pub fn write_markers(home: &GemHome, gem: &Gem) -> Result<Vec<PathBuf>, MarkerError> {
    let root = home.gem_dir(&gem.full_name());
    let mut written = vec![write_marker(&root)?];

    for require_path in &gem.require_paths {
        let relative = match normalize_entry_path(Path::new(require_path)) {
            Ok(Some(relative)) => relative,
            // "." or "" means the gem root, which already has a marker
            Ok(None) => continue,
            Err(_) => return Err(MarkerError::UnsafeRequirePath(require_path.clone())),
        };

        let dir = root.join(relative);
        if !dir.is_dir() {
            warn!(gem = %gem, path = %dir.display(), "require path missing, no marker written");
            continue;
        }
        written.push(write_marker(&dir)?);
    }

    Ok(written)
}

fn write_marker(dir: &Path) -> Result<PathBuf, MarkerError> {
    let path = dir.join(MARKER_FILE);
    fs::write(&path, MARKER_CONTENT).map_err(|source| MarkerError::Io {
        path: path.clone(),
        source,
    })?;
    debug!(path = %path.display(), "wrote marker");
    Ok(path)
}
