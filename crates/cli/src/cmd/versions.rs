//! List stored versions of a tracked file name

use anyhow::Result;
use keepsake_core::{Configuration, VersionStore};
use owo_colors::OwoColorize;
use std::path::Path;

pub fn run(config_path: &Path, name: &str) -> Result<()> {
    let config = Configuration::load(config_path)?;
    let store = VersionStore::open(&config.version_root)?;

    let versions = store.list_versions(name);
    if versions.is_empty() {
        println!("No versions of {} yet", name);
        return Ok(());
    }

    for version in &versions {
        let age = version
            .token
            .timestamp_ms()
            .map(crate::util::format_relative_time)
            .unwrap_or_default();
        println!(
            "{}  {}  {}",
            version.token.to_string().yellow(),
            age.dimmed(),
            version.path.display()
        );
    }
    println!();
    println!("{} version(s) of {}", versions.len(), name);
    Ok(())
}
