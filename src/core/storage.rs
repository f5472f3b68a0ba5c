//! Local persisted key-value state.
//!
//! Values are opaque strings (usually JSON). The file-backed store keeps one
//! file per key and replaces it atomically on every write, so a crash never
//! leaves a half-written value behind.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tempfile::NamedTempFile;

pub const KEY_SESSIONS: &str = "chat-sessions";
pub const KEY_ACTIVE_SESSION: &str = "active-session-id";
pub const KEY_SAVED_ARTICLES: &str = "saved-articles";
pub const KEY_API_KEY: &str = "openrouter-api-key";
pub const KEY_SELECTED_MODEL: &str = "selected-model";

#[derive(Debug)]
pub enum StoreError {
    Io {
        key: String,
        source: std::io::Error,
    },
    Persist {
        key: String,
        source: tempfile::PersistError,
    },
    InvalidKey(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io { key, source } => write!(f, "storage error for '{key}': {source}"),
            StoreError::Persist { key, source } => {
                write!(f, "failed to persist '{key}': {source}")
            }
            StoreError::InvalidKey(key) => write!(f, "invalid storage key: {key}"),
        }
    }
}

impl StdError for StoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StoreError::Io { source, .. } => Some(source),
            StoreError::Persist { source, .. } => Some(source),
            StoreError::InvalidKey(_) => None,
        }
    }
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

pub type SharedStore = Arc<dyn KeyValueStore>;

/// Directory-backed store: `<dir>/<key>` holds the value for `key`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let mut temp_file = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        temp_file.write_all(value.as_bytes()).map_err(io_err)?;
        temp_file.as_file_mut().sync_all().map_err(io_err)?;
        temp_file
            .persist(&path)
            .map_err(|source| StoreError::Persist {
                key: key.to_string(),
                source,
            })?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}

/// In-process store, used by tests and `--ephemeral` runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_store_round_trips_values() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileStore::new(temp_dir.path().join("state"));

        assert_eq!(store.get(KEY_SESSIONS).unwrap(), None);
        store.set(KEY_SESSIONS, "[]").unwrap();
        assert_eq!(store.get(KEY_SESSIONS).unwrap().as_deref(), Some("[]"));

        store.set(KEY_SESSIONS, "[1]").unwrap();
        assert_eq!(store.get(KEY_SESSIONS).unwrap().as_deref(), Some("[1]"));

        store.remove(KEY_SESSIONS).unwrap();
        assert_eq!(store.get(KEY_SESSIONS).unwrap(), None);
    }

    #[test]
    fn file_store_removing_missing_key_is_ok() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileStore::new(temp_dir.path());
        store.remove(KEY_API_KEY).unwrap();
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileStore::new(temp_dir.path());
        assert!(matches!(
            store.set("../escape", "x"),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(store.get(""), Err(StoreError::InvalidKey(_))));
    }

    #[test]
    fn file_store_leaves_no_temp_files_behind() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileStore::new(temp_dir.path());
        store.set(KEY_SELECTED_MODEL, "m1").unwrap();

        let entries: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(entries, vec![KEY_SELECTED_MODEL.to_string()]);
    }

    #[test]
    fn memory_store_round_trips_values() {
        let store = MemoryStore::new();
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }
}
