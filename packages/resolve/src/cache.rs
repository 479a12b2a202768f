//! Persistent key/value cache for locally resolved sources.
//!
//! Keys are normalized filenames (see [`CacheKeyPolicy`]); values are the
//! decoded text of the file. Nothing here ever evicts an entry.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pyhost_vfs::ModulePath;
use serde::{Deserialize, Serialize};

use crate::error::{ResolveError, Result};

/// A string key/value store that outlives a single resolution.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Arc<dyn PersistentCache>`.
pub trait PersistentCache: Send + Sync {
    /// Look up an entry.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - No entry for the key.
    /// * `Ok(Some(text))` - The cached text.
    /// * `Err(ResolveError)` - The backing store failed.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Insert or replace an entry.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
}

impl<T: PersistentCache + ?Sized> PersistentCache for Arc<T> {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.as_ref().get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.as_ref().set_item(key, value)
    }
}

impl<T: PersistentCache + ?Sized> PersistentCache for Box<T> {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.as_ref().get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.as_ref().set_item(key, value)
    }
}

/// How a module path is turned into a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKeyPolicy {
    /// The leaf filename without any query or fingerprint suffix.
    ///
    /// Two files with the same name in different directories share a key.
    #[default]
    RawFilename,
    /// The whole normalized path with the leaf's suffix stripped.
    FullPath,
}

impl CacheKeyPolicy {
    pub fn key_for(&self, path: &ModulePath) -> String {
        match self {
            CacheKeyPolicy::RawFilename => path.raw_filename().to_string(),
            CacheKeyPolicy::FullPath => {
                let parent = path.parent();
                if parent.is_empty() {
                    path.raw_filename().to_string()
                } else {
                    format!("{}/{}", parent, path.raw_filename())
                }
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A cache that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PersistentCache for MemoryCache {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// A cache persisted as one JSON document on disk.
///
/// The document is read once when the cache is opened and rewritten on every
/// `set_item`, via a temporary file renamed over the original.
#[derive(Debug)]
pub struct DiskCache {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl DiskCache {
    /// Open the cache file, starting empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(
            "Opened cache {} with {} entries",
            path.display(),
            entries.len()
        );

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The sibling written before being renamed over the cache file.
    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let tmp = self.temp_path();
        let json = serde_json::to_vec_pretty(entries)?;

        let mut f = fs::File::create(&tmp).map_err(|err| ResolveError::Cache {
            message: format!(
                "cache file ({}) could not be created: {}",
                tmp.display(),
                err
            ),
        })?;
        f.write_all(&json)?;
        f.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl PersistentCache for DiskCache {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = lock(&self.entries);
        let mut updated = entries.clone();
        updated.insert(key.to_string(), value.to_string());
        tracing::debug!("Writing cache entry {} to {}", key, self.path.display());
        self.persist(&updated)?;
        *entries = updated;
        Ok(())
    }
}
