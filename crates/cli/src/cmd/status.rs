//! Show daemon and version-store status

use anyhow::Result;
use keepsake_core::{Configuration, VersionStore};
use owo_colors::OwoColorize;
use std::path::Path;

pub fn run(config_path: &Path) -> Result<()> {
    let state_dir = crate::paths::state_dir()?;
    match crate::locks::running_daemon(&state_dir)? {
        Some(info) => {
            println!(
                "{} (pid {}, started {})",
                "running".green(),
                info.pid,
                crate::util::format_relative_time(info.started_at)
            );
        }
        None => println!("{}", "stopped".red()),
    }

    let config = Configuration::load(config_path)?;
    println!();
    println!("Watched folders:");
    for target in &config.targets {
        println!(
            "  {}  {}",
            target.folder.display(),
            target.patterns.join(", ").dimmed()
        );
    }

    let store = VersionStore::open(&config.version_root)?;
    println!();
    println!("Version root: {}", config.version_root.display());
    println!("Stored versions: {}", store.count_versions());
    Ok(())
}
