//! String key-value persistence.
//!
//! [`JsonFileStore`] keeps every entry in one JSON object on disk and is what
//! the CLI uses; [`MemoryStore`] backs tests and ephemeral sessions.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::TrackerError;
use crate::lock;

pub trait KeyValueStore: Send + Sync {
    /// Returns the raw value under `key`, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::StorageIo`] when the backing medium fails.
    fn get(&self, key: &str) -> Result<Option<String>, TrackerError>;

    /// # Errors
    ///
    /// Returns [`TrackerError::StorageIo`] when the backing medium fails.
    fn set(&self, key: &str, value: &str) -> Result<(), TrackerError>;

    /// Removes `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::StorageIo`] when the backing medium fails.
    fn remove(&self, key: &str) -> Result<(), TrackerError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, TrackerError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), TrackerError> {
        lock(&self.entries).insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), TrackerError> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

/// All entries in a single `store.json` under the data directory.
///
/// Writes go to a temporary sibling first and are renamed into place. An
/// unreadable file is logged and treated as empty. Every call does blocking
/// file I/O; async callers run it on the blocking pool.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    io: Mutex<()>,
}

impl JsonFileStore {
    pub const FILE_NAME: &'static str = "store.json";

    #[must_use]
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::at(data_dir.join(Self::FILE_NAME))
    }

    #[must_use]
    pub fn at(path: PathBuf) -> Self {
        Self {
            path,
            io: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> TrackerError {
        TrackerError::StorageIo {
            path: self.path.clone(),
            source,
        }
    }

    fn read_all(&self) -> Result<HashMap<String, String>, TrackerError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(self.io_err(e)),
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "store file is not a JSON object of strings; starting empty"
                );
                Ok(HashMap::new())
            }
        }
    }

    fn write_all(&self, entries: &HashMap<String, String>) -> Result<(), TrackerError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
            }
        }
        let body = serde_json::to_string_pretty(entries).map_err(|e| {
            self.io_err(std::io::Error::new(ErrorKind::InvalidData, e))
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, TrackerError> {
        let _guard = lock(&self.io);
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), TrackerError> {
        let _guard = lock(&self.io);
        let mut entries = self.read_all()?;
        entries.insert(key.to_owned(), value.to_owned());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), TrackerError> {
        let _guard = lock(&self.io);
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        std::env::temp_dir().join(format!(
            "nearoffers-store-{name}-{}-{nanos}",
            std::process::id()
        ))
    }

    #[test]
    fn memory_store_get_set_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = scratch_dir("persist");
        let first = JsonFileStore::in_dir(&dir);
        first.set("lastKnownLocation", "{\"a\":1}").unwrap();
        first.set("other", "x").unwrap();

        let second = JsonFileStore::in_dir(&dir);
        assert_eq!(
            second.get("lastKnownLocation").unwrap().as_deref(),
            Some("{\"a\":1}")
        );
        second.remove("lastKnownLocation").unwrap();
        assert_eq!(first.get("lastKnownLocation").unwrap(), None);
        assert_eq!(first.get("other").unwrap().as_deref(), Some("x"));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn file_store_missing_file_reads_empty() {
        let store = JsonFileStore::in_dir(&scratch_dir("missing"));
        assert_eq!(store.get("anything").unwrap(), None);
        store.remove("anything").unwrap();
    }

    #[test]
    fn file_store_garbage_file_reads_empty() {
        let dir = scratch_dir("garbage");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(JsonFileStore::FILE_NAME), "{{{ not json").unwrap();

        let store = JsonFileStore::in_dir(&dir);
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));

        fs::remove_dir_all(&dir).ok();
    }
}
