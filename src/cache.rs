//! Persisted change cache (`vector_store.json`).
//!
//! Maps absolute file path to the last seen content hash, its token count and
//! the model summary once one exists. The whole map is loaded at start and
//! rewritten on every save; a record with a matching hash keeps its summary.

use crate::error::{Error, Result};
use crate::writer::write_file_atomic;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Cached state of one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path, duplicated from the map key
    pub file_path: String,

    /// Lowercase hex SHA-256 of the UTF-8 content
    pub hash: String,

    /// Token count at the time of hashing
    pub tokens: usize,

    /// Model summary; unset until analysis succeeds
    pub summary: Option<String>,
}

/// What [`ChangeCache::upsert`] did with a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record existed
    Inserted,
    /// The hash changed; the record was replaced and its summary cleared
    Updated,
    /// The hash matched; the record was left untouched
    Unchanged,
}

/// In-memory view of the change cache bound to its file.
#[derive(Debug, Clone)]
pub struct ChangeCache {
    path: PathBuf,
    records: BTreeMap<String, FileRecord>,
}

impl ChangeCache {
    /// Creates an empty cache that will be saved to `path`.
    #[must_use]
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: BTreeMap::new(),
        }
    }

    /// Loads the cache from `path`, starting empty if the file is absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheCorrupt`] if the file exists but is not a valid
    /// cache. Silently discarding it would re-bill every summary.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if !path.exists() {
            debug!("No cache at {}, starting empty", path.display());
            return Ok(Self::empty(path));
        }

        let raw = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        let records: BTreeMap<String, FileRecord> =
            serde_json::from_str(&raw).map_err(|e| Error::cache_corrupt(&path, e.to_string()))?;

        debug!("Loaded {} cache records from {}", records.len(), path.display());
        Ok(Self { path, records })
    }

    /// Records the current content of `key`.
    ///
    /// A new or changed hash replaces the record with an unset summary; a
    /// matching hash leaves the record, summary included, as it was.
    pub fn upsert(&mut self, key: &str, content: &str, tokens: usize) -> UpsertOutcome {
        let hash = hash_content(content);

        let outcome = match self.records.get(key) {
            None => UpsertOutcome::Inserted,
            Some(record) if record.hash != hash => UpsertOutcome::Updated,
            Some(_) => return UpsertOutcome::Unchanged,
        };

        self.records.insert(
            key.to_string(),
            FileRecord {
                file_path: key.to_string(),
                hash,
                tokens,
                summary: None,
            },
        );

        outcome
    }

    /// Stores a summary for an existing record. Returns false if `key` is unknown.
    pub fn set_summary(&mut self, key: &str, summary: impl Into<String>) -> bool {
        match self.records.get_mut(key) {
            Some(record) => {
                record.summary = Some(summary.into());
                true
            }
            None => false,
        }
    }

    /// Returns the record for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FileRecord> {
        self.records.get(key)
    }

    /// Returns the cached summary for `key`, if analysis already succeeded.
    #[must_use]
    pub fn summary(&self, key: &str) -> Option<&str> {
        self.records.get(key).and_then(|r| r.summary.as_deref())
    }

    /// Returns the keys of records still waiting for a summary.
    #[must_use]
    pub fn pending(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|(_, r)| r.summary.is_none())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Drops records whose file no longer exists and returns how many went.
    pub fn prune_missing(&mut self) -> usize {
        let before = self.records.len();
        self.records.retain(|key, _| Path::new(key).exists());
        before - self.records.len()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rewrites the whole cache file (pretty JSON, atomic replace).
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.records)?;
        write_file_atomic(&self.path, &json, false)?;
        debug!("Saved {} cache records to {}", self.records.len(), self.path.display());
        Ok(())
    }
}

/// Lowercase hex SHA-256 of the UTF-8 bytes of `content`.
#[must_use]
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
