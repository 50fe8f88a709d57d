use std::path::Path;

use anyhow::{anyhow, Result};
use wax_core::db::{load_config, save_config, SweepConfig};

/// Write the default sweep config to `path`, refusing to overwrite.
pub fn init_config_command(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(anyhow!("Config file already exists: {}", path.display()));
    }
    save_config(path, &SweepConfig::default())?;
    println!("Wrote default sweep config to {}", path.display());
    Ok(())
}

/// The config at `path`, or the defaults when no path is given.
pub fn resolve_config(path: Option<&Path>) -> Result<SweepConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(SweepConfig::default()),
    }
}
