//! Default locations for configuration and daemon state

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Resolve the configuration file path: the explicit flag if given,
/// else `<os config dir>/keepsake/config.toml`
pub fn resolve_config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    let base = dirs::config_dir().context("could not determine the OS configuration directory")?;
    Ok(base.join("keepsake").join("config.toml"))
}

/// Directory holding the daemon lock and log files
pub fn state_dir() -> Result<PathBuf> {
    let base = dirs::data_local_dir().context("could not determine the OS local data directory")?;
    Ok(base.join("keepsake"))
}
