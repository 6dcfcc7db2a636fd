//! Lock file management for daemon exclusivity
//!
//! The lock file carries the owner's PID so sibling commands (`ks
//! stop`, `ks status`) can find and signal the running daemon.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Held for the lifetime of a running daemon
pub struct DaemonLock {
    path: PathBuf,
    #[allow(dead_code)]
    file: File,
}

/// Lock file content
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LockContent {
    pub pid: u32,
    /// Unix epoch milliseconds
    pub started_at: u64,
}

impl DaemonLock {
    /// Acquire the exclusive daemon lock inside the state directory
    ///
    /// A lock held by a dead process is reclaimed; a lock held by a
    /// live one means the daemon is already running.
    pub fn acquire(state_dir: &Path) -> Result<Self> {
        let lock_path = state_dir.join("daemon.lock");
        std::fs::create_dir_all(state_dir).context("failed to create state directory")?;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&lock_path)
            .context("failed to open lock file")?;

        if !try_flock_exclusive(&file)? {
            if Self::is_stale(&mut file)? {
                tracing::warn!("removing stale daemon lock");
                drop(file);
                std::fs::remove_file(&lock_path)?;
                return Self::acquire(state_dir);
            }
            anyhow::bail!("daemon already running (lock held by a live process)");
        }

        let content = LockContent {
            pid: std::process::id(),
            started_at: unix_millis(),
        };
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(serde_json::to_string(&content)?.as_bytes())?;
        file.sync_all()?;

        Ok(Self {
            path: lock_path,
            file,
        })
    }

    fn is_stale(file: &mut File) -> Result<bool> {
        match read_content(file) {
            Ok(content) => Ok(!is_process_alive(content.pid)),
            // Unreadable content means a crashed writer; reclaim
            Err(_) => Ok(true),
        }
    }
}

impl Drop for DaemonLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// PID and start time of the running daemon, if any
pub fn running_daemon(state_dir: &Path) -> Result<Option<LockContent>> {
    let lock_path = state_dir.join("daemon.lock");
    let mut file = match File::open(&lock_path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).context("failed to open lock file"),
    };
    let Ok(content) = read_content(&mut file) else {
        return Ok(None);
    };
    if is_process_alive(content.pid) {
        Ok(Some(content))
    } else {
        Ok(None)
    }
}

fn read_content(file: &mut File) -> Result<LockContent> {
    file.seek(SeekFrom::Start(0))?;
    let mut raw = String::new();
    file.read_to_string(&mut raw)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Try to acquire an exclusive file lock (non-blocking)
#[cfg(unix)]
fn try_flock_exclusive(file: &File) -> Result<bool> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(_) => Ok(true),
        Err(nix::errno::Errno::EWOULDBLOCK) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(target_os = "linux")]
fn is_process_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    // Null signal: existence check without delivering anything
    match kill(Pid::from_raw(pid as i32), None) {
        Ok(_) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        // EPERM and friends: some live process owns the pid
        Err(_) => true,
    }
}

fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_is_exclusive_while_held() {
        let dir = TempDir::new().unwrap();

        let first = DaemonLock::acquire(dir.path());
        assert!(first.is_ok());

        // A second acquire sees a live owner and refuses
        let second = DaemonLock::acquire(dir.path());
        assert!(second.is_err());

        drop(first);

        let third = DaemonLock::acquire(dir.path());
        assert!(third.is_ok());
    }

    #[test]
    fn drop_removes_the_lock_file() {
        let dir = TempDir::new().unwrap();

        let lock = DaemonLock::acquire(dir.path()).unwrap();
        let lock_path = lock.path.clone();
        assert!(lock_path.exists());

        drop(lock);
        assert!(!lock_path.exists());
    }

    #[test]
    fn stale_lock_is_reclaimed() {
        let dir = TempDir::new().unwrap();
        // A dead pid with no flock held: acquire must succeed
        std::fs::write(
            dir.path().join("daemon.lock"),
            r#"{"pid":999999,"started_at":0}"#,
        )
        .unwrap();

        let lock = DaemonLock::acquire(dir.path());
        assert!(lock.is_ok());
    }

    #[test]
    fn running_daemon_reports_live_owner() {
        let dir = TempDir::new().unwrap();

        assert!(running_daemon(dir.path()).unwrap().is_none());

        let _lock = DaemonLock::acquire(dir.path()).unwrap();
        let info = running_daemon(dir.path()).unwrap().unwrap();
        assert_eq!(info.pid, std::process::id());
        assert!(info.started_at > 0);
    }

    #[test]
    fn running_daemon_ignores_dead_owner() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("daemon.lock"),
            r#"{"pid":999999,"started_at":0}"#,
        )
        .unwrap();

        assert!(running_daemon(dir.path()).unwrap().is_none());
    }

    #[test]
    fn process_liveness() {
        assert!(is_process_alive(std::process::id()));
        assert!(!is_process_alive(999999));
    }
}
