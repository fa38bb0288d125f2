//! `jem install`.

use anyhow::{bail, Context, Result};
use jem::{DuplicateBehavior, InstallResult, Installer, InstallerConfig};
use std::path::{Path, PathBuf};

/// Config file picked up from the current directory when `--config` is absent.
pub const CONFIG_FILE: &str = "jem.toml";

/// Command-line settings for an install run.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    pub install_dir: Option<PathBuf>,
    pub on_duplicate: Option<DuplicateBehavior>,
    pub markers: bool,
    pub config: Option<PathBuf>,
    pub lock: bool,
}

/// Merge defaults, the config file and the command line, in that order.
pub fn resolve_config(options: &InstallOptions, cwd: &Path) -> Result<InstallerConfig> {
    let mut config = match &options.config {
        Some(path) => InstallerConfig::from_path(path)
            .with_context(|| format!("Failed to load config '{}'", path.display()))?,
        None => {
            let path = cwd.join(CONFIG_FILE);
            if path.is_file() {
                InstallerConfig::from_path(&path)
                    .with_context(|| format!("Failed to load config '{}'", path.display()))?
            } else {
                InstallerConfig::default()
            }
        }
    };

    if let Some(dir) = &options.install_dir {
        config.install_dir.clone_from(dir);
    }
    if let Some(policy) = options.on_duplicate {
        config.on_duplicate = policy;
    }
    if options.markers {
        config.markers = true;
    }
    Ok(config)
}

/// Install `gems` and print one line per archive.
pub fn install_gems(gems: &[PathBuf], options: &InstallOptions) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let config = resolve_config(options, &cwd)?;
    let installer = Installer::from_config(&config);

    tracing::debug!(
        install_dir = %config.install_dir.display(),
        policy = %config.on_duplicate,
        markers = config.markers,
        "starting install"
    );

    let batch = if options.lock {
        installer.install_many_locked(gems)
    } else {
        installer.install_many(gems)
    };
    let results = batch.with_context(|| {
        format!(
            "Failed to prepare installation directory '{}'",
            config.install_dir.display()
        )
    })?;

    for result in &results {
        println!("{}", summary_line(result));
    }

    let failed = results.iter().filter(|r| !r.is_success()).count();
    if failed > 0 {
        bail!("{} of {} gem(s) failed to install", failed, results.len());
    }
    Ok(())
}

fn summary_line(result: &InstallResult) -> String {
    let label = result
        .gem
        .as_ref()
        .map_or_else(|| result.gem_file.display().to_string(), |gem| gem.full_name());

    match &result.error {
        Some(e) => format!("Failed: {label}: {e}"),
        None if result.warnings.is_empty() => format!("Installed: {label}"),
        None => format!(
            "Installed: {label} ({} warning(s))",
            result.warnings.len()
        ),
    }
}
