//! File-backed stores under the cache directory.
//!
//! Each resource gets a directory named by the SHA-256 of its id, so
//! arbitrary ids never reach the filesystem. Entries are small TOML files:
//! `bookmarks.toml` and `progress.toml` per resource, and a shared
//! `preferences.toml` at the cache root.

use crate::bookmarks::{BookmarkBackend, flip};
use crate::boundary::SavedProgress;
use crate::config::AppConfig;
use crate::error::PersistenceError;
use crate::playback::{ProgressStore, ProgressWrite};
use crate::preferences::PreferenceStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub fn cache_root(config: &AppConfig) -> PathBuf {
    PathBuf::from(&config.cache_dir)
}

pub fn hash_dir(cache_root: &Path, resource_id: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(resource_id.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    cache_root.join(hash)
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistenceError> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistenceError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    toml::from_str(&data)
        .map(Some)
        .map_err(|err| PersistenceError::Decode(format!("{}: {err}", path.display())))
}

fn write_toml<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let contents =
        toml::to_string(value).map_err(|err| PersistenceError::Encode(err.to_string()))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| PersistenceError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, contents).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct BookmarkEntry {
    resource_id: String,
    #[serde(default)]
    sentences: BTreeSet<usize>,
}

#[derive(Debug, Clone)]
pub struct FileBookmarkStore {
    root: PathBuf,
}

impl FileBookmarkStore {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            root: cache_root.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(cache_root(config))
    }

    fn path(&self, resource_id: &str) -> PathBuf {
        hash_dir(&self.root, resource_id).join("bookmarks.toml")
    }
}

impl BookmarkBackend for FileBookmarkStore {
    fn get(&self, resource_id: &str) -> Result<Vec<usize>, PersistenceError> {
        let entry: Option<BookmarkEntry> = read_toml(&self.path(resource_id))?;
        Ok(entry
            .map(|entry| entry.sentences.into_iter().collect())
            .unwrap_or_default())
    }

    fn toggle(&mut self, resource_id: &str, sentence_index: usize) -> Result<(), PersistenceError> {
        let path = self.path(resource_id);
        let mut entry: BookmarkEntry = read_toml(&path)?.unwrap_or_default();
        entry.resource_id = resource_id.to_string();
        let bookmarked = flip(&mut entry.sentences, sentence_index);
        debug!(resource_id, sentence_index, bookmarked, "Saving bookmark toggle");
        write_toml(&path, &entry)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ProgressEntry {
    seq: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unit_id: Option<String>,
    position_seconds: f64,
}

/// Progress per resource. The stored sequence tag makes an older write a
/// no-op, including writes from earlier controller instances.
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    root: PathBuf,
}

impl FileProgressStore {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            root: cache_root.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(cache_root(config))
    }

    fn path(&self, resource_id: &str) -> PathBuf {
        hash_dir(&self.root, resource_id).join("progress.toml")
    }
}

impl ProgressStore for FileProgressStore {
    fn get_progress(&mut self, resource_id: &str) -> Result<Option<SavedProgress>, PersistenceError> {
        let entry: Option<ProgressEntry> = read_toml(&self.path(resource_id))?;
        Ok(entry.map(|entry| SavedProgress::new(entry.unit_id, Some(entry.position_seconds))))
    }

    fn set_progress(&mut self, write: &ProgressWrite) -> Result<(), PersistenceError> {
        let path = self.path(&write.resource_id);
        if let Some(existing) = read_toml::<ProgressEntry>(&path)? {
            if existing.seq > write.seq {
                debug!(
                    seq = write.seq,
                    stored = existing.seq,
                    "Discarding superseded progress write"
                );
                return Ok(());
            }
        }
        write_toml(
            &path,
            &ProgressEntry {
                seq: write.seq,
                unit_id: write.unit_id.clone(),
                position_seconds: write.position_seconds,
            },
        )
    }
}

#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(cache_root: impl AsRef<Path>) -> Self {
        Self {
            path: cache_root.as_ref().join("preferences.toml"),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(cache_root(config))
    }

    fn load(&self) -> Result<BTreeMap<String, String>, PersistenceError> {
        Ok(read_toml(&self.path)?.unwrap_or_default())
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.load()?.remove(key))
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());
        write_toml(&self.path, &values)
    }
}
