//! Start the Keepsake daemon

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

pub async fn run(config_path: &Path, foreground: bool) -> Result<()> {
    if foreground {
        // Run the daemon in this process (for debugging and service
        // managers that supervise foreground children)
        crate::daemon::run(config_path).await
    } else {
        start_background(config_path).await
    }
}

async fn start_background(config_path: &Path) -> Result<()> {
    use std::process::{Command, Stdio};

    let state_dir = crate::paths::state_dir()?;
    let log_dir = state_dir.join("logs");
    std::fs::create_dir_all(&log_dir).context("failed to create logs directory")?;
    let log_file = log_dir.join("daemon.log");

    let exe = std::env::current_exe().context("failed to get current executable path")?;
    let log_writer = std::fs::File::create(&log_file).context("failed to create log file")?;

    Command::new("nohup")
        .arg(&exe)
        .arg("--config")
        .arg(config_path)
        .arg("start")
        .arg("--foreground")
        .stdin(Stdio::null())
        .stdout(log_writer.try_clone()?)
        .stderr(log_writer)
        .spawn()
        .context("failed to spawn daemon process")?;

    // Give the child a moment to validate its configuration and take
    // the lock
    tokio::time::sleep(Duration::from_millis(500)).await;

    match crate::locks::running_daemon(&state_dir)? {
        Some(info) => {
            println!("Daemon started (pid {})", info.pid);
            println!("Logs: {}", log_file.display());
            Ok(())
        }
        None => anyhow::bail!(
            "daemon failed to start (check logs at {})",
            log_file.display()
        ),
    }
}
