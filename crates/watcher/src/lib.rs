//! File system watching for Keepsake
//!
//! This crate turns raw OS notifications into per-path "a tracked
//! file changed and went quiet" signals:
//! - Event source: notify subscriptions bridged into an async channel
//! - Path filter: tracked-file matching (exact names and globs)
//! - Debouncer: per-path coalescing with a size/mtime quiescence check

pub mod debounce;
pub mod filter;
pub mod source;

use std::path::PathBuf;
use std::time::Instant;

pub use debounce::Debouncer;
pub use filter::PathFilter;
pub use source::{EventSource, WatchError};

/// A raw file system event, as delivered by the OS watch subsystem
#[derive(Debug, Clone)]
pub struct RawEvent {
    /// Path that changed
    pub path: PathBuf,
    /// Type of change
    pub kind: EventKind,
    /// When the event was observed
    pub observed_at: Instant,
}

/// Type of file system event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// File created
    Created,
    /// File modified
    Modified,
    /// File removed
    Removed,
    /// File renamed (the path is the rename source or destination)
    Renamed,
}
