//! Error taxonomy
//!
//! `ConfigError` variants are fatal at startup: the process must exit
//! non-zero before entering the watch loop. `StoreError` variants are
//! recovered per path by the orchestrator; a failed version write for
//! one file never stops monitoring of the others.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("configuration has no watch targets")]
    NoTargets,

    #[error("watched folder does not exist: {}", .0.display())]
    MissingFolder(PathBuf),

    #[error("watch target {} has no file patterns", folder.display())]
    EmptyPatterns { folder: PathBuf },

    #[error("invalid file pattern {pattern:?}")]
    BadPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// Version-store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create version root {}", path.display())]
    CreateRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read source file {}", path.display())]
    ReadSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("source file name is not valid UTF-8: {}", .0.display())]
    InvalidSourceName(PathBuf),

    #[error("failed to create version directory {}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write version {}", path.display())]
    WriteVersion {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
