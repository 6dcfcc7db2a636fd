//! Daemon orchestration
//!
//! Wires the event source, path filter, debouncer and version store
//! into the long-running watch loop and owns its lifecycle: startup
//! validation, shutdown signals, graceful drain of in-flight writes.

use anyhow::{Context, Result};
use keepsake_core::{Configuration, VersionStore};
use keepsake_watcher::{Debouncer, EventSource, PathFilter, RawEvent};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Quiescence sweep cadence: a fraction of the debounce window,
/// clamped so sweeps stay responsive without busy-polling
fn sweep_interval(window: Duration) -> Duration {
    (window / 4).clamp(Duration::from_millis(100), Duration::from_millis(500))
}

/// A validated, subscribed daemon that has not started its loop yet
///
/// Every fatal startup condition (unreadable configuration, missing
/// folder, malformed pattern, unwatchable folder) surfaces in
/// [`Daemon::launch`], before any event is consumed.
pub struct Daemon {
    config: Configuration,
    store: Arc<VersionStore>,
    filter: PathFilter,
    source: EventSource,
    events: mpsc::Receiver<RawEvent>,
}

impl Daemon {
    /// Validate the configuration and start the OS subscriptions
    pub fn launch(config: Configuration) -> Result<Self> {
        let store = VersionStore::open(&config.version_root)?;
        let filter = PathFilter::new(&config)?;
        let (source, events) = EventSource::start(&config)?;

        for target in &config.targets {
            info!(
                folder = %target.folder.display(),
                patterns = ?target.patterns,
                recursive = target.recursive,
                "watching"
            );
        }
        info!(version_root = %config.version_root.display(), "daemon started");

        Ok(Self {
            config,
            store: Arc::new(store),
            filter,
            source,
            events,
        })
    }

    /// Run the watch loop until `shutdown` resolves
    ///
    /// On shutdown the OS subscription is torn down first, then
    /// outstanding version writes are awaited up to the configured
    /// grace period; writes still pending after that are abandoned,
    /// never forced.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let Daemon {
            config,
            store,
            filter,
            source,
            mut events,
        } = self;

        let debouncer = Arc::new(Debouncer::new(config.debounce_window()));
        let mut sweep = tokio::time::interval(sweep_interval(config.debounce_window()));
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut writes: JoinSet<()> = JoinSet::new();
        let mut source_failed = false;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                maybe = events.recv() => match maybe {
                    Some(event) => {
                        if filter.matches(&event.path) {
                            debug!(path = %event.path.display(), kind = ?event.kind, "tracked file event");
                            debouncer.observe(&event);
                        }
                    }
                    None => {
                        error!("file system event source terminated");
                        source_failed = true;
                        break;
                    }
                },
                _ = sweep.tick() => {
                    dispatch_quiescent(&debouncer, &store, &mut writes);
                },
                Some(res) = writes.join_next(), if !writes.is_empty() => {
                    if let Err(e) = res {
                        error!("version write task panicked: {}", e);
                    }
                },
                _ = &mut shutdown => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        // Stop accepting raw events before draining.
        drop(source);
        drain_writes(writes, config.grace_period()).await;
        info!("daemon stopped");

        if source_failed {
            anyhow::bail!("file system event source terminated unexpectedly");
        }
        Ok(())
    }
}

/// Load the configuration, take the daemon lock and run until a
/// termination signal
pub async fn run(config_path: &Path) -> Result<()> {
    let config = Configuration::load(config_path).with_context(|| {
        format!(
            "failed to load configuration from {}",
            config_path.display()
        )
    })?;

    let state_dir = crate::paths::state_dir()?;
    let _lock = crate::locks::DaemonLock::acquire(&state_dir)?;

    let daemon = Daemon::launch(config)?;
    daemon.run_until(shutdown_signal()?).await
}

/// Resolves when SIGTERM or SIGINT is delivered
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    })
}

/// Release quiescent paths to the version writer, one blocking task
/// per path. Writes for different paths run concurrently; the
/// debouncer's in-flight set keeps each path serial.
fn dispatch_quiescent(
    debouncer: &Arc<Debouncer>,
    store: &Arc<VersionStore>,
    writes: &mut JoinSet<()>,
) {
    let swept = debouncer.take_quiescent(Instant::now());
    for path in swept.discarded {
        debug!(path = %path.display(), "pending change discarded, file deleted before quiescence");
    }
    for path in swept.ready {
        let store = Arc::clone(store);
        let debouncer = Arc::clone(debouncer);
        writes.spawn_blocking(move || {
            write_one(&store, &path);
            debouncer.finish(&path);
        });
    }
}

/// Write one version; failures are logged and contained to this path
fn write_one(store: &VersionStore, path: &Path) {
    match store.write_version(path) {
        Ok(Some(version)) => {
            info!(
                path = %path.display(),
                token = %version.token,
                version = %version.path.display(),
                "version written"
            );
        }
        Ok(None) => {
            debug!(path = %path.display(), "source vanished before snapshot, nothing to version");
        }
        Err(e) => {
            error!(path = %path.display(), "version write failed: {:#}", anyhow::Error::from(e));
        }
    }
}

async fn drain_writes(mut writes: JoinSet<()>, grace: Duration) {
    if writes.is_empty() {
        return;
    }
    info!(pending = writes.len(), "draining in-flight version writes");
    let drained = tokio::time::timeout(grace, async {
        while writes.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(
            abandoned = writes.len(),
            "grace period elapsed, abandoning in-flight version writes"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_interval_tracks_the_window() {
        assert_eq!(
            sweep_interval(Duration::from_millis(1500)),
            Duration::from_millis(375)
        );
        // Clamped low for tiny windows
        assert_eq!(
            sweep_interval(Duration::from_millis(100)),
            Duration::from_millis(100)
        );
        // Clamped high for huge windows
        assert_eq!(
            sweep_interval(Duration::from_secs(60)),
            Duration::from_millis(500)
        );
    }
}
