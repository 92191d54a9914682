//! Persistent key-value store backed by a single JSON file.
//!
//! Used for the few values that must survive a worker restart (the shared
//! validator's pid and keypair). A missing or unreadable file behaves like
//! an empty store: reads return `None` and the next write starts a fresh map.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::fs::atomic_write;
use crate::StoreError;

pub struct PersistentStore {
    path: PathBuf,
}

impl PersistentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Map<String, Value> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Map::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "unreadable store file, treating as empty: {e}");
                return Map::new();
            }
        };
        match serde_json::from_slice::<Map<String, Value>>(&bytes) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "corrupt store file, treating as empty: {e}");
                Map::new()
            }
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes =
            serde_json::to_vec_pretty(map).map_err(|e| StoreError::Serialization(e.to_string()))?;
        atomic_write(&self.path, &bytes)?;
        Ok(())
    }

    /// Read the value under `key`.
    ///
    /// A value that exists but does not decode as `T` is reported as `None`
    /// with a warning, like a corrupt file.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.read_map().remove(key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(key, "stored value has unexpected shape: {e}");
                None
            }
        }
    }

    /// Insert or replace `key`.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let value =
            serde_json::to_value(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut map = self.read_map();
        map.insert(key.to_string(), value);
        self.write_map(&map)
    }

    /// Delete `key`. Returns whether it was present.
    pub fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let mut map = self.read_map();
        if map.remove(key).is_none() {
            return Ok(false);
        }
        self.write_map(&map)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Handle {
        pid: u32,
        key: String,
    }

    fn temp_store() -> (tempfile::TempDir, PersistentStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = PersistentStore::new(dir.path().join("state.json"));
        (dir, store)
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let (_dir, store) = temp_store();
        assert_eq!(store.get::<Handle>("validator"), None);
    }

    #[test]
    fn set_then_get_survives_reopen() {
        let (dir, store) = temp_store();
        let handle = Handle { pid: 7, key: "abc".into() };
        store.set("validator", &handle).unwrap();

        let reopened = PersistentStore::new(dir.path().join("state.json"));
        assert_eq!(reopened.get::<Handle>("validator"), Some(handle));
    }

    #[test]
    fn corrupt_file_recovers_on_next_write() {
        let (_dir, store) = temp_store();
        fs::write(store.path(), b"\x80\x04not json").unwrap();
        assert_eq!(store.get::<Handle>("validator"), None);

        store.set("other", &1u32).unwrap();
        assert_eq!(store.get::<u32>("other"), Some(1));
    }

    #[test]
    fn keys_are_independent() {
        let (_dir, store) = temp_store();
        store.set("a", &1u32).unwrap();
        store.set("b", &2u32).unwrap();
        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert_eq!(store.get::<u32>("a"), None);
        assert_eq!(store.get::<u32>("b"), Some(2));
    }

    #[test]
    fn wrong_shape_reads_as_none() {
        let (_dir, store) = temp_store();
        store.set("validator", &"just a string").unwrap();
        assert_eq!(store.get::<Handle>("validator"), None);
    }
}
