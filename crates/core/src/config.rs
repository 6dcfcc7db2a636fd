//! Configuration model and loading
//!
//! Configuration is loaded once at startup and is read-only for the
//! lifetime of the process. Applying a change means restarting the
//! watch subsystem, never mutating in-flight state.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_debounce_ms() -> u64 {
    1500
}

fn default_grace_ms() -> u64 {
    5000
}

/// A watched (folder, pattern-set) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchTarget {
    /// Folder to watch (tilde-expanded at load time)
    pub folder: PathBuf,

    /// File name patterns: exact names or globs, matched against base
    /// names inside the folder
    pub patterns: Vec<String>,

    /// Watch subdirectories too (default: false)
    #[serde(default)]
    pub recursive: bool,
}

/// Full daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    /// Root directory for stored versions
    pub version_root: PathBuf,

    /// Idle duration after the last event before a version is written
    #[serde(default = "default_debounce_ms")]
    pub debounce_window_ms: u64,

    /// Shutdown drain bound for in-flight version writes
    #[serde(default = "default_grace_ms")]
    pub grace_period_ms: u64,

    /// Watched folders
    #[serde(default, rename = "target")]
    pub targets: Vec<WatchTarget>,
}

impl Configuration {
    /// Load and validate a configuration file
    ///
    /// Any failure here is fatal: the daemon must not enter the watch
    /// loop with a partial or guessed configuration.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, path)
    }

    /// Parse and validate a TOML document
    pub fn parse(raw: &str, origin: &Path) -> Result<Self, ConfigError> {
        let mut config: Configuration =
            toml::from_str(raw).map_err(|source| ConfigError::Parse {
                path: origin.to_path_buf(),
                source,
            })?;

        config.version_root = expand_tilde(&config.version_root);
        for target in &mut config.targets {
            target.folder = expand_tilde(&target.folder);
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }

        for target in &self.targets {
            if !target.folder.is_dir() {
                return Err(ConfigError::MissingFolder(target.folder.clone()));
            }
            if target.patterns.is_empty() || target.patterns.iter().all(|p| p.trim().is_empty()) {
                return Err(ConfigError::EmptyPatterns {
                    folder: target.folder.clone(),
                });
            }
            for pattern in &target.patterns {
                // Compile check only; the watcher builds its own
                // matchers from the validated strings.
                if is_glob_pattern(pattern) {
                    glob::Pattern::new(pattern).map_err(|source| ConfigError::BadPattern {
                        pattern: pattern.clone(),
                        source,
                    })?;
                }
            }
        }

        Ok(())
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Commented starter configuration written by `ks init`
    pub fn default_template() -> &'static str {
        r#"# Keepsake configuration
#
# Every change to a matched file produces a timestamped copy under
# version_root. Patterns are exact file names or globs, matched
# against base names inside the target folder.

version_root = "~/keepsake-versions"

# Milliseconds a file must stay quiet after its last change before a
# version is written.
debounce_window_ms = 1500

# Milliseconds to wait for in-flight version writes on shutdown.
grace_period_ms = 5000

[[target]]
folder = "~/Downloads"
patterns = ["statement.pdf", "invoice.pdf", "report.pdf"]
# Set to true to also watch subdirectories.
# recursive = false
"#
    }
}

/// Whether a pattern needs glob matching rather than an exact compare
pub fn is_glob_pattern(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Expand a leading `~` to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn doc(version_root: &Path, folder: &Path, patterns: &str) -> String {
        format!(
            r#"
version_root = "{}"

[[target]]
folder = "{}"
patterns = {}
"#,
            version_root.display(),
            folder.display(),
            patterns
        )
    }

    #[test]
    fn parse_applies_defaults() {
        let dir = TempDir::new().unwrap();
        let raw = doc(&dir.path().join("versions"), dir.path(), r#"["report.pdf"]"#);

        let config = Configuration::parse(&raw, Path::new("test.toml")).unwrap();
        assert_eq!(config.debounce_window(), Duration::from_millis(1500));
        assert_eq!(config.grace_period(), Duration::from_millis(5000));
        assert_eq!(config.targets.len(), 1);
        assert!(!config.targets[0].recursive);
    }

    #[test]
    fn parse_reads_explicit_values() {
        let dir = TempDir::new().unwrap();
        let raw = format!(
            r#"
version_root = "{}"
debounce_window_ms = 250
grace_period_ms = 1000

[[target]]
folder = "{}"
patterns = ["*.md"]
recursive = true
"#,
            dir.path().join("versions").display(),
            dir.path().display()
        );

        let config = Configuration::parse(&raw, Path::new("test.toml")).unwrap();
        assert_eq!(config.debounce_window(), Duration::from_millis(250));
        assert!(config.targets[0].recursive);
    }

    #[test]
    fn missing_folder_is_fatal() {
        let dir = TempDir::new().unwrap();
        let raw = doc(
            &dir.path().join("versions"),
            &dir.path().join("does-not-exist"),
            r#"["report.pdf"]"#,
        );

        let err = Configuration::parse(&raw, Path::new("test.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingFolder(_)));
    }

    #[test]
    fn empty_patterns_are_fatal() {
        let dir = TempDir::new().unwrap();
        let raw = doc(&dir.path().join("versions"), dir.path(), "[]");

        let err = Configuration::parse(&raw, Path::new("test.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyPatterns { .. }));
    }

    #[test]
    fn malformed_glob_is_fatal() {
        let dir = TempDir::new().unwrap();
        let raw = doc(&dir.path().join("versions"), dir.path(), r#"["report["]"#);

        let err = Configuration::parse(&raw, Path::new("test.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::BadPattern { .. }));
    }

    #[test]
    fn no_targets_is_fatal() {
        let raw = r#"version_root = "/tmp/versions""#;
        let err = Configuration::parse(raw, Path::new("test.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NoTargets));
    }

    #[test]
    fn invalid_toml_is_fatal() {
        let err = Configuration::parse("version_root = [", Path::new("test.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn default_template_deserializes() {
        // Validation would require ~/Downloads to exist; the template
        // only has to be well-formed TOML for the Configuration shape.
        let config: Configuration = toml::from_str(Configuration::default_template()).unwrap();
        assert_eq!(config.targets.len(), 1);
        assert_eq!(config.targets[0].patterns.len(), 3);
    }

    #[test]
    fn tilde_expansion() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/docs")), home.join("docs"));
        }
        assert_eq!(
            expand_tilde(Path::new("/absolute/docs")),
            PathBuf::from("/absolute/docs")
        );
    }
}
