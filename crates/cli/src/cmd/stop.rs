//! Stop the Keepsake daemon

use anyhow::{Context, Result};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::time::Duration;

pub async fn run() -> Result<()> {
    let state_dir = crate::paths::state_dir()?;
    let Some(info) = crate::locks::running_daemon(&state_dir)? else {
        println!("Daemon is not running");
        return Ok(());
    };

    kill(Pid::from_raw(info.pid as i32), Signal::SIGTERM)
        .context("failed to signal the daemon")?;

    // Wait out the graceful drain
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if crate::locks::running_daemon(&state_dir)?.is_none() {
            println!("Daemon stopped");
            return Ok(());
        }
    }
    anyhow::bail!("daemon (pid {}) did not stop within 5 seconds", info.pid)
}
