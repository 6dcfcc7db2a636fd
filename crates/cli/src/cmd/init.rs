//! Write a starter configuration file

use anyhow::{Context, Result};
use keepsake_core::Configuration;
use std::path::Path;

pub fn run(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "configuration already exists at {} (use --force to overwrite)",
            config_path.display()
        );
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create configuration directory")?;
    }
    std::fs::write(config_path, Configuration::default_template())
        .with_context(|| format!("failed to write {}", config_path.display()))?;

    println!("Wrote starter configuration to {}", config_path.display());
    println!("Edit it, then run: ks start");
    Ok(())
}
