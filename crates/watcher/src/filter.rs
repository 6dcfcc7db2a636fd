//! Tracked-file matching
//!
//! Decides whether an event's path belongs to a configured watch
//! target. Pure after construction: one compiled matcher per target,
//! no filesystem access, so remove and rename events are matched the
//! same way as modifications. A rename *into* a tracked name
//! triggers; a rename away does not.

use glob::Pattern;
use keepsake_core::config::{is_glob_pattern, Configuration};
use keepsake_core::error::ConfigError;
use keepsake_core::token::split_version_name;
use std::path::{Path, PathBuf};

/// File names that are never worth versioning: in-progress browser
/// downloads, editor swap/backup files, OS metadata
fn is_transient_name(name: &str) -> bool {
    // Dotfiles, including .#emacs locks and ._ macOS metadata
    if name.starts_with('.') {
        return true;
    }
    // Browser spool files
    if name.ends_with(".crdownload") || name.ends_with(".download") || name.ends_with(".part") {
        return true;
    }
    // Editor swap and backup files
    if name.ends_with(".swp") || name.ends_with(".swo") || name.ends_with('~') {
        return true;
    }
    // Emacs auto-save
    if name.starts_with('#') && name.ends_with('#') {
        return true;
    }
    name == "Thumbs.db" || name == "desktop.ini"
}

#[derive(Debug)]
enum NamePattern {
    Exact(String),
    Glob(Pattern),
}

impl NamePattern {
    fn compile(raw: &str) -> Result<Self, ConfigError> {
        if is_glob_pattern(raw) {
            Pattern::new(raw)
                .map(Self::Glob)
                .map_err(|source| ConfigError::BadPattern {
                    pattern: raw.to_string(),
                    source,
                })
        } else {
            Ok(Self::Exact(raw.to_string()))
        }
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(exact) => exact == name,
            Self::Glob(pattern) => pattern.matches(name),
        }
    }
}

#[derive(Debug)]
struct CompiledTarget {
    folder: PathBuf,
    recursive: bool,
    patterns: Vec<NamePattern>,
}

impl CompiledTarget {
    fn contains_dir(&self, dir: &Path) -> bool {
        if self.recursive {
            dir.starts_with(&self.folder)
        } else {
            dir == self.folder
        }
    }
}

/// Tracked-file matcher compiled from the configuration
#[derive(Debug)]
pub struct PathFilter {
    targets: Vec<CompiledTarget>,
    version_root: PathBuf,
}

impl PathFilter {
    /// Compile the configured patterns. A malformed glob is a
    /// configuration error, fatal at startup.
    pub fn new(config: &Configuration) -> Result<Self, ConfigError> {
        let mut targets = Vec::with_capacity(config.targets.len());
        for target in &config.targets {
            let patterns = target
                .patterns
                .iter()
                .map(|raw| NamePattern::compile(raw))
                .collect::<Result<Vec<_>, _>>()?;
            targets.push(CompiledTarget {
                folder: target.folder.clone(),
                recursive: target.recursive,
                patterns,
            });
        }
        Ok(Self {
            targets,
            version_root: config.version_root.clone(),
        })
    }

    /// Whether `path` is a tracked file
    pub fn matches(&self, path: &Path) -> bool {
        // Never track our own output, even when the version root is
        // nested inside a watched folder.
        if path.starts_with(&self.version_root) {
            return false;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if is_transient_name(name) {
            return false;
        }
        // Files that carry a version token are versions we wrote.
        if split_version_name(name).is_some() {
            return false;
        }

        let Some(parent) = path.parent() else {
            return false;
        };
        self.targets
            .iter()
            .any(|t| t.contains_dir(parent) && t.patterns.iter().any(|p| p.matches(name)))
    }
}
