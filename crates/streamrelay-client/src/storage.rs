//! Client-local key/value persistence.
//!
//! Values are plain strings. Implementations:
//! - [`MemoryStore`]: process lifetime only
//! - [`FileStore`]: JSON map on disk, write-through
//! - [`UnavailableStore`]: every operation fails (storage disabled by the host)

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use streamrelay_core::error::{RelayError, Result};

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every key.
    pub fn clear(&self) {
        lock(&self.map).clear();
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.map).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.map).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.map).remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object file.
///
/// The file is read once on open; every mutation rewrites it.
pub struct FileStore {
    path: PathBuf,
    map: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let map = match std::fs::read_to_string(&path) {
            Ok(s) if s.trim().is_empty() => BTreeMap::new(),
            Ok(s) => serde_json::from_str(&s).map_err(|e| {
                RelayError::Storage(format!("corrupt store {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(RelayError::Storage(format!(
                    "read {} failed: {e}",
                    path.display()
                )))
            }
        };
        Ok(Self {
            path,
            map: Mutex::new(map),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let body = serde_json::to_string_pretty(map)
            .map_err(|e| RelayError::Storage(format!("encode store failed: {e}")))?;
        std::fs::write(&self.path, body)
            .map_err(|e| RelayError::Storage(format!("write {} failed: {e}", self.path.display())))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.map).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = lock(&self.map);
        map.insert(key.to_string(), value.to_string());
        self.persist(&map)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut map = lock(&self.map);
        if map.remove(key).is_some() {
            self.persist(&map)?;
        }
        Ok(())
    }
}

/// Storage that refuses every operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStore;

impl KeyValueStore for UnavailableStore {
    fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(RelayError::Storage("storage unavailable".into()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(RelayError::Storage("storage unavailable".into()))
    }

    fn remove(&self, _key: &str) -> Result<()> {
        Err(RelayError::Storage("storage unavailable".into()))
    }
}
