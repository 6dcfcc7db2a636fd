//! Shared helpers for CLI output

/// Format an epoch-milliseconds timestamp as a relative time
/// ("2 hours ago")
pub fn format_relative_time(ts_ms: u64) -> String {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    let then = UNIX_EPOCH + Duration::from_millis(ts_ms);
    let Ok(elapsed) = SystemTime::now().duration_since(then) else {
        return "in the future".to_string();
    };

    let secs = elapsed.as_secs();
    if secs < 60 {
        format!("{} seconds ago", secs)
    } else if secs < 3600 {
        format!("{} minutes ago", secs / 60)
    } else if secs < 86400 {
        format!("{} hours ago", secs / 3600)
    } else if secs < 604800 {
        format!("{} days ago", secs / 86400)
    } else {
        format!("{} weeks ago", secs / 604800)
    }
}
