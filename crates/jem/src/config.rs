//! Installer configuration (`jem.toml`).
//!
//! ```toml
//! install-dir = "vendor/gems"
//! on-duplicate = "skip"
//! markers = true
//! ```

use crate::policy::DuplicateBehavior;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the default installation directory.
pub const GEM_HOME_ENV: &str = "GEM_HOME";

/// Errors that can occur when loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings shared by every install in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct InstallerConfig {
    /// Root of the gem home layout.
    #[serde(default = "default_install_dir")]
    pub install_dir: PathBuf,

    /// Conflict policy for existing artifacts.
    #[serde(default)]
    pub on_duplicate: DuplicateBehavior,

    /// Write load-root markers after each install.
    #[serde(default)]
    pub markers: bool,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            install_dir: default_install_dir(),
            on_duplicate: DuplicateBehavior::default(),
            markers: false,
        }
    }
}

impl InstallerConfig {
    /// Configuration for `install_dir` with default settings.
    #[must_use]
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
            ..Self::default()
        }
    }

    /// Load a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or has unknown keys.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// `$GEM_HOME`, else `$HOME/.gem/jem`, else `.gem`.
fn default_install_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(GEM_HOME_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        return PathBuf::from(home).join(".gem").join("jem");
    }
    PathBuf::from(".gem")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let config = InstallerConfig::parse(
            r#"
install-dir = "vendor/gems"
on-duplicate = "skip"
markers = true
"#,
        )
        .unwrap();
        assert_eq!(config.install_dir, PathBuf::from("vendor/gems"));
        assert_eq!(config.on_duplicate, DuplicateBehavior::Skip);
        assert!(config.markers);
    }

    #[test]
    fn defaults_fill_missing_keys() {
        let config = InstallerConfig::parse("install-dir = \"/srv/gems\"\n").unwrap();
        assert_eq!(config.on_duplicate, DuplicateBehavior::Overwrite);
        assert!(!config.markers);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = InstallerConfig::parse("install-dir = \"x\"\nparallel = 4\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!(InstallerConfig::parse("on-duplicate = \"replace\"\n").is_err());
    }

    #[test]
    fn from_path_reads_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("jem.toml");
        std::fs::write(&path, "on-duplicate = \"fail\"\n").unwrap();

        let config = InstallerConfig::from_path(&path).unwrap();
        assert_eq!(config.on_duplicate, DuplicateBehavior::Fail);
    }
}
