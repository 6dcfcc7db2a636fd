//! Filesystem event source
//!
//! Wraps a notify watcher over every configured folder and bridges
//! its callback-thread delivery into a bounded async channel: slow
//! processing can never block the OS notification thread, and
//! notification delivery cannot outrun the orchestrator unboundedly.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use keepsake_core::Configuration;
use notify::event::{Event, EventKind as NotifyKind, ModifyKind};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// Capacity of the channels between the notify callback thread and
/// the orchestrator loop
const RAW_CHANNEL_CAPACITY: usize = 1024;

/// Errors starting the OS watch subscription
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to initialize the file system watcher")]
    Init(#[source] notify::Error),

    #[error("failed to watch folder {}", folder.display())]
    Watch {
        folder: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Handle to a running event source
///
/// Dropping it tears down the OS subscription; no further raw events
/// are accepted after that.
pub struct EventSource {
    _watcher: RecommendedWatcher,
    _bridge: JoinHandle<()>,
}

impl EventSource {
    /// Subscribe to every configured folder
    ///
    /// Fails if the watcher cannot be created or any folder cannot be
    /// watched; both are fatal startup conditions. Must be called
    /// from within a Tokio runtime.
    pub fn start(
        config: &Configuration,
    ) -> Result<(Self, mpsc::Receiver<crate::RawEvent>), WatchError> {
        let (raw_tx, raw_rx) = bounded::<Result<Event, notify::Error>>(RAW_CHANNEL_CAPACITY);

        let mut watcher = RecommendedWatcher::new(
            move |res| forward_raw(&raw_tx, res),
            notify::Config::default(),
        )
        .map_err(WatchError::Init)?;

        for target in &config.targets {
            let mode = if target.recursive {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            watcher
                .watch(&target.folder, mode)
                .map_err(|source| WatchError::Watch {
                    folder: target.folder.clone(),
                    source,
                })?;
        }

        let (event_tx, event_rx) = mpsc::channel::<crate::RawEvent>(RAW_CHANNEL_CAPACITY);
        let bridge = tokio::task::spawn_blocking(move || bridge_events(raw_rx, event_tx));

        Ok((
            Self {
                _watcher: watcher,
                _bridge: bridge,
            },
            event_rx,
        ))
    }
}

/// Runs on the notify callback thread; must never block
fn forward_raw(tx: &Sender<Result<Event, notify::Error>>, res: Result<Event, notify::Error>) {
    match tx.try_send(res) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            // The debouncer tolerates missing intermediate events;
            // blocking the OS notification thread would not.
            warn!("raw event channel full, dropping event");
        }
        Err(TrySendError::Disconnected(_)) => {}
    }
}

/// Bridge thread: classify notify events and forward them to the
/// async loop
fn bridge_events(
    raw_rx: Receiver<Result<Event, notify::Error>>,
    event_tx: mpsc::Sender<crate::RawEvent>,
) {
    while let Ok(res) = raw_rx.recv() {
        match res {
            Ok(event) => {
                let Some(kind) = classify(&event.kind) else {
                    continue;
                };
                for path in event.paths {
                    let raw = crate::RawEvent {
                        path,
                        kind,
                        observed_at: Instant::now(),
                    };
                    if event_tx.blocking_send(raw).is_err() {
                        // Orchestrator gone, shut down
                        return;
                    }
                }
            }
            Err(e) => {
                // The OS watch subsystem failed for one subscription.
                // Remaining folders stay watched; the operator can
                // detect the dead one from this record.
                error!(paths = ?e.paths, "file system watcher error: {}", e);
            }
        }
    }
}

/// Map notify's event taxonomy onto ours; access and pure metadata
/// noise is dropped at the source
fn classify(kind: &NotifyKind) -> Option<crate::EventKind> {
    match kind {
        NotifyKind::Create(_) => Some(crate::EventKind::Created),
        NotifyKind::Modify(ModifyKind::Name(_)) => Some(crate::EventKind::Renamed),
        NotifyKind::Modify(ModifyKind::Metadata(_)) => None,
        NotifyKind::Modify(_) => Some(crate::EventKind::Modified),
        NotifyKind::Remove(_) => Some(crate::EventKind::Removed),
        _ => None,
    }
}
