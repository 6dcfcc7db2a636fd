//! Version storage
//!
//! Versions are immutable copies named `<original>.<token>[-<n>]`,
//! laid out under the version root as a tree mirroring the source
//! file locations. A write is snapshot-read + temp-file + rename, so
//! a concurrent reader of the version directory never observes a
//! partially written file at a final version path.

use crate::error::StoreError;
use crate::token::{split_version_name, VersionToken};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

/// Reference to a stored version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRef {
    pub path: PathBuf,
    pub token: VersionToken,
}

/// Version store rooted at a single directory
pub struct VersionStore {
    root: PathBuf,

    /// Last token issued per source path. Tokens for one file must be
    /// strictly increasing even if the wall clock steps backwards.
    last_issued: Mutex<HashMap<PathBuf, VersionToken>>,
}

impl VersionStore {
    /// Open a store, creating the root directory if needed
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(root).map_err(|source| StoreError::CreateRoot {
            path: root.to_path_buf(),
            source,
        })?;
        Ok(Self {
            root: root.to_path_buf(),
            last_issued: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a new version of `source`
    ///
    /// Returns `Ok(None)` if the source vanished between quiescence
    /// confirmation and the snapshot read: a deleted file is nothing
    /// to version, not an error.
    pub fn write_version(&self, source: &Path) -> Result<Option<VersionRef>, StoreError> {
        // Snapshot read: the whole file in one go, never a streaming
        // copy that could race a concurrent writer.
        let bytes = match fs::read(source) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source_err) => {
                return Err(StoreError::ReadSource {
                    path: source.to_path_buf(),
                    source: source_err,
                })
            }
        };

        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::InvalidSourceName(source.to_path_buf()))?;

        let dir = self.version_dir_for(source);
        fs::create_dir_all(&dir).map_err(|source_err| StoreError::CreateDir {
            path: dir.clone(),
            source: source_err,
        })?;

        let (target, token) = self.reserve_target(source, &dir, name);

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| StoreError::WriteVersion {
            path: target.clone(),
            source: e,
        })?;
        tmp.write_all(&bytes).map_err(|e| StoreError::WriteVersion {
            path: target.clone(),
            source: e,
        })?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StoreError::WriteVersion {
                path: target.clone(),
                source: e,
            })?;
        tmp.persist(&target).map_err(|e| StoreError::WriteVersion {
            path: target.clone(),
            source: e.error,
        })?;

        self.last_issued
            .lock()
            .insert(source.to_path_buf(), token.clone());

        Ok(Some(VersionRef {
            path: target,
            token,
        }))
    }

    /// List stored versions of an original file name, oldest first
    ///
    /// Order is recovered purely from tokens, never from file
    /// metadata.
    pub fn list_versions(&self, original_name: &str) -> Vec<VersionRef> {
        let mut found = Vec::new();
        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str() else {
                continue;
            };
            if let Some((name, token)) = split_version_name(file_name) {
                if name == original_name {
                    found.push(VersionRef {
                        path: entry.into_path(),
                        token,
                    });
                }
            }
        }
        found.sort_by(|a, b| a.token.cmp(&b.token));
        found
    }

    /// Total number of stored versions across all files
    pub fn count_versions(&self) -> usize {
        WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.file_name()
                    .to_str()
                    .is_some_and(|n| split_version_name(n).is_some())
            })
            .count()
    }

    /// Version directory for a source file: the source's parent
    /// directory re-rooted under the version root
    fn version_dir_for(&self, source: &Path) -> PathBuf {
        let parent = source.parent().unwrap_or_else(|| Path::new("/"));
        let mut dir = self.root.clone();
        for component in parent.components() {
            if let Component::Normal(part) = component {
                dir.push(part);
            }
        }
        dir
    }

    /// Choose the next token and target path for `source`
    ///
    /// The token is clamped to stay above the last one issued for
    /// this file, and the exact target path is existence-checked so
    /// same-millisecond writes get a `-1`, `-2`, ... suffix instead
    /// of colliding.
    fn reserve_target(&self, source: &Path, dir: &Path, name: &str) -> (PathBuf, VersionToken) {
        let now = VersionToken::now();
        let floor = self
            .last_issued
            .lock()
            .get(source)
            .cloned()
            .or_else(|| latest_on_disk(dir, name));

        let mut token = match floor {
            Some(prev) if now <= prev => prev.successor(),
            _ => now,
        };

        loop {
            let candidate = dir.join(format!("{name}.{token}"));
            if !candidate.exists() {
                return (candidate, token);
            }
            token = token.successor();
        }
    }
}

/// Highest existing token for `name` inside one version directory
fn latest_on_disk(dir: &Path, name: &str) -> Option<VersionToken> {
    let entries = fs::read_dir(dir).ok()?;
    let mut latest: Option<VersionToken> = None;
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        let Some((original, token)) = split_version_name(file_name) else {
            continue;
        };
        if original == name && latest.as_ref().map_or(true, |l| token > *l) {
            latest = Some(token);
        }
    }
    latest
}
