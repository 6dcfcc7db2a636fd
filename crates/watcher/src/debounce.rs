//! Per-path debouncing and quiescence detection
//!
//! Editors emit several write/flush events per user-visible save
//! (temp-file + rename dances, multiple small writes). The debouncer
//! coalesces each burst into one trigger per path, and only releases
//! a path once it has stayed quiet for the configured window AND its
//! size/mtime stopped moving, so a file is never copied mid-write.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use crate::{EventKind, RawEvent};

/// Size/mtime sample used by the quiescence re-check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StatSample {
    len: u64,
    mtime: SystemTime,
}

fn stat(path: &Path) -> std::io::Result<StatSample> {
    let meta = fs::metadata(path)?;
    Ok(StatSample {
        len: meta.len(),
        mtime: meta.modified()?,
    })
}

/// One path with an outstanding, not-yet-versioned modification
#[derive(Debug)]
struct PendingChange {
    first_seen: Instant,
    last_seen: Instant,
    /// Size/mtime as of the most recent event or sweep; a moving
    /// sample restarts the window.
    last_stat: Option<StatSample>,
}

/// Outcome of one quiescence sweep
#[derive(Debug, Default)]
pub struct Quiescent {
    /// Paths that went quiet and should be versioned now
    pub ready: Vec<PathBuf>,
    /// Paths discarded because the file disappeared before quiescence
    pub discarded: Vec<PathBuf>,
}

struct State {
    pending: HashMap<PathBuf, PendingChange>,
    /// Paths whose version write is currently executing. At most one
    /// in-flight write per path; new events for such a path start a
    /// fresh pending cycle instead of interleaving with the write.
    in_flight: HashSet<PathBuf>,
}

/// Per-path event coalescing
///
/// The pending table is the only state touched from both the event
/// intake and the sweep timer; one mutex serializes every access to a
/// given path's entry.
pub struct Debouncer {
    window: Duration,
    state: Mutex<State>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: Mutex::new(State {
                pending: HashMap::new(),
                in_flight: HashSet::new(),
            }),
        }
    }

    /// Record a matching raw event
    pub fn observe(&self, event: &RawEvent) {
        let mut state = self.state.lock();
        match event.kind {
            EventKind::Removed => {
                // No version of a deleted file
                state.pending.remove(&event.path);
            }
            EventKind::Created | EventKind::Modified | EventKind::Renamed => {
                let sample = stat(&event.path).ok();
                let entry = state
                    .pending
                    .entry(event.path.clone())
                    .or_insert(PendingChange {
                        first_seen: event.observed_at,
                        last_seen: event.observed_at,
                        last_stat: None,
                    });
                entry.last_seen = event.observed_at;
                entry.last_stat = sample;
            }
        }
    }

    /// Sweep the pending table for quiescent paths
    ///
    /// A path is released once the debounce window has elapsed since
    /// its last event and its size/mtime still matches the recorded
    /// sample. A moving sample restarts the window from `now`; a
    /// missing file discards the entry. Released paths are marked
    /// in-flight until [`Debouncer::finish`] is called for them.
    pub fn take_quiescent(&self, now: Instant) -> Quiescent {
        let mut out = Quiescent::default();
        let mut state = self.state.lock();
        let State {
            pending, in_flight, ..
        } = &mut *state;

        pending.retain(|path, change| {
            if now.saturating_duration_since(change.last_seen) < self.window {
                return true;
            }
            if in_flight.contains(path) {
                return true;
            }
            match stat(path) {
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    out.discarded.push(path.clone());
                    false
                }
                // Let the version writer surface a proper error
                Err(_) => {
                    in_flight.insert(path.clone());
                    out.ready.push(path.clone());
                    false
                }
                Ok(sample) => {
                    if change.last_stat == Some(sample) {
                        tracing::debug!(
                            path = %path.display(),
                            burst_ms = now.saturating_duration_since(change.first_seen).as_millis() as u64,
                            "path quiescent"
                        );
                        in_flight.insert(path.clone());
                        out.ready.push(path.clone());
                        false
                    } else {
                        // Still moving: restart the window from here
                        change.last_stat = Some(sample);
                        change.last_seen = now;
                        true
                    }
                }
            }
        });

        out
    }

    /// Mark a path's version write as complete, allowing the next
    /// pending cycle to be released
    pub fn finish(&self, path: &Path) {
        self.state.lock().in_flight.remove(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const WINDOW: Duration = Duration::from_millis(500);

    fn event(path: &Path, kind: EventKind, at: Instant) -> RawEvent {
        RawEvent {
            path: path.to_path_buf(),
            kind,
            observed_at: at,
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn burst_coalesces_to_one_trigger() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("report.pdf");
        fs::write(&file, b"contents").unwrap();

        let debouncer = Debouncer::new(WINDOW);
        let t0 = Instant::now();

        for i in 0..5 {
            debouncer.observe(&event(&file, EventKind::Modified, t0 + ms(i * 50)));
        }

        // Last event at t0+200ms: nothing may fire before t0+700ms
        let early = debouncer.take_quiescent(t0 + ms(400));
        assert!(early.ready.is_empty());

        let late = debouncer.take_quiescent(t0 + ms(700));
        assert_eq!(late.ready, vec![file.clone()]);

        // Exactly once
        debouncer.finish(&file);
        let again = debouncer.take_quiescent(t0 + ms(5000));
        assert!(again.ready.is_empty());
    }

    #[test]
    fn new_event_restarts_the_window() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("report.pdf");
        fs::write(&file, b"contents").unwrap();

        let debouncer = Debouncer::new(WINDOW);
        let t0 = Instant::now();

        debouncer.observe(&event(&file, EventKind::Modified, t0));
        debouncer.observe(&event(&file, EventKind::Modified, t0 + ms(400)));

        // Window restarted at t0+400ms
        let early = debouncer.take_quiescent(t0 + ms(600));
        assert!(early.ready.is_empty());

        let late = debouncer.take_quiescent(t0 + ms(900));
        assert_eq!(late.ready, vec![file]);
    }

    #[test]
    fn removed_event_discards_pending() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("fleeting.txt");
        fs::write(&file, b"here and gone").unwrap();

        let debouncer = Debouncer::new(WINDOW);
        let t0 = Instant::now();

        debouncer.observe(&event(&file, EventKind::Created, t0));
        debouncer.observe(&event(&file, EventKind::Removed, t0 + ms(100)));

        let swept = debouncer.take_quiescent(t0 + ms(5000));
        assert!(swept.ready.is_empty());
        assert!(swept.discarded.is_empty());
    }

    #[test]
    fn silently_deleted_file_is_discarded_at_sweep() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("fleeting.txt");
        fs::write(&file, b"here and gone").unwrap();

        let debouncer = Debouncer::new(WINDOW);
        let t0 = Instant::now();

        debouncer.observe(&event(&file, EventKind::Modified, t0));
        fs::remove_file(&file).unwrap();

        let swept = debouncer.take_quiescent(t0 + ms(700));
        assert!(swept.ready.is_empty());
        assert_eq!(swept.discarded, vec![file]);
    }

    #[test]
    fn moving_file_restarts_until_stable() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("growing.bin");
        fs::write(&file, b"part").unwrap();

        let debouncer = Debouncer::new(WINDOW);
        let t0 = Instant::now();

        debouncer.observe(&event(&file, EventKind::Modified, t0));

        // The file keeps growing without further events (a slow
        // writer): the sweep must not release it.
        fs::write(&file, b"part and then some").unwrap();
        let first = debouncer.take_quiescent(t0 + ms(700));
        assert!(first.ready.is_empty());

        // Quiet since the restart: released one window later.
        let second = debouncer.take_quiescent(t0 + ms(700) + WINDOW);
        assert_eq!(second.ready, vec![file]);
    }

    #[test]
    fn mtime_change_alone_restarts_window() {
        use filetime::{set_file_mtime, FileTime};

        let dir = TempDir::new().unwrap();
        let file = dir.path().join("touched.txt");
        fs::write(&file, b"same size").unwrap();

        let debouncer = Debouncer::new(WINDOW);
        let t0 = Instant::now();

        debouncer.observe(&event(&file, EventKind::Modified, t0));

        // Same bytes, different mtime: still not quiescent
        set_file_mtime(&file, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();
        let first = debouncer.take_quiescent(t0 + ms(700));
        assert!(first.ready.is_empty());

        let second = debouncer.take_quiescent(t0 + ms(700) + WINDOW);
        assert_eq!(second.ready, vec![file]);
    }

    #[test]
    fn in_flight_path_is_not_redispatched() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("report.pdf");
        fs::write(&file, b"v1").unwrap();

        let debouncer = Debouncer::new(WINDOW);
        let t0 = Instant::now();

        debouncer.observe(&event(&file, EventKind::Modified, t0));
        let swept = debouncer.take_quiescent(t0 + ms(700));
        assert_eq!(swept.ready, vec![file.clone()]);

        // A new edit arrives while the write is in flight
        debouncer.observe(&event(&file, EventKind::Modified, t0 + ms(800)));
        let blocked = debouncer.take_quiescent(t0 + ms(5000));
        assert!(blocked.ready.is_empty());

        // Once the write completes, the next cycle proceeds
        debouncer.finish(&file);
        let released = debouncer.take_quiescent(t0 + ms(5000));
        assert_eq!(released.ready, vec![file]);
    }

    #[test]
    fn unrelated_paths_sweep_independently() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();

        let debouncer = Debouncer::new(WINDOW);
        let t0 = Instant::now();

        debouncer.observe(&event(&a, EventKind::Modified, t0));
        debouncer.observe(&event(&b, EventKind::Modified, t0 + ms(400)));

        let first = debouncer.take_quiescent(t0 + ms(600));
        assert_eq!(first.ready, vec![a]);

        let second = debouncer.take_quiescent(t0 + ms(1000));
        assert_eq!(second.ready, vec![b]);
    }
}
