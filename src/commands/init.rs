//! Default configuration file generation.

use ohno::{IntoAppError, bail};
use repo_harvest::Result;
use repo_harvest::config::DEFAULT_CONFIG_TOML;
use std::fs;
use std::path::Path;

/// Write the embedded default configuration to `path`, refusing to overwrite.
pub fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("'{}' already exists, not overwriting", path.display());
    }

    fs::write(path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("unable to write '{}'", path.display()))?;
    println!("wrote default configuration to '{}'", path.display());
    Ok(())
}
