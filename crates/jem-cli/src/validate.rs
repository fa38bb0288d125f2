//! `jem validate`.

use anyhow::{bail, Result};
use jem::validate_gem;
use std::path::PathBuf;

/// Check each file and print whether it is a usable gem archive.
pub fn validate_gems(gems: &[PathBuf]) -> Result<()> {
    let mut invalid = 0;
    for gem in gems {
        match validate_gem(gem) {
            Ok(()) => println!("Valid: {}", gem.display()),
            Err(e) => {
                eprintln!("Invalid: {}: {e}", gem.display());
                invalid += 1;
            }
        }
    }

    if invalid > 0 {
        bail!("{} of {} file(s) are not valid gems", invalid, gems.len());
    }
    Ok(())
}
