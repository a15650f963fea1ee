//! Key-value storage behind the localization cache.
//!
//! Every write must be atomic from a reader's point of view: readers see either
//! the previous map or the new one, never a partial file.

use crate::error::Result;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;
use tracing::debug;

/// Flat string-key → localized text map
pub type StringMap = BTreeMap<String, String>;

/// Address of one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
    pub language_key: String,
    pub context: String,
}

impl CacheKey {
    pub fn new(language_key: &str, context: &str) -> Self {
        Self {
            language_key: language_key.to_string(),
            context: context.to_string(),
        }
    }

    /// `{language_key}_{context}.json`
    pub fn file_name(&self) -> String {
        format!("{}_{}.json", self.language_key, self.context)
    }

    /// Parse a file name back into a key. Language keys never contain `_`.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(".json")?;
        let (language_key, context) = stem.split_once('_')?;
        if language_key.is_empty() || context.is_empty() {
            return None;
        }
        Some(Self::new(language_key, context))
    }
}

pub trait LocalizationStore: Send + Sync {
    fn get(&self, key: &CacheKey) -> Result<Option<StringMap>>;

    /// Replace the entry atomically
    fn put(&self, key: &CacheKey, strings: &StringMap) -> Result<()>;

    /// Returns whether an entry was removed
    fn remove(&self, key: &CacheKey) -> Result<bool>;

    fn keys(&self) -> Result<Vec<CacheKey>>;
}

/// One JSON file per entry in a single directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }
}

impl LocalizationStore for FsStore {
    fn get(&self, key: &CacheKey) -> Result<Option<StringMap>> {
        match fs::read_to_string(self.path(key)) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &CacheKey, strings: &StringMap) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        // Temp file lives in the same directory so the rename stays on one filesystem
        let mut file = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer(&mut file, strings)?;
        file.flush()?;
        file.persist(self.path(key)).map_err(|e| e.error)?;

        debug!("Wrote {} strings to {}", strings.len(), key.file_name());
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> Result<bool> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<CacheKey>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(key) = entry.file_name().to_str().and_then(CacheKey::from_file_name) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// In-process store, mainly for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<CacheKey, StringMap>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalizationStore for MemoryStore {
    fn get(&self, key: &CacheKey) -> Result<Option<StringMap>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &CacheKey, strings: &StringMap) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.clone(), strings.clone());
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> Result<bool> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<CacheKey>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.keys().cloned().collect())
    }
}
