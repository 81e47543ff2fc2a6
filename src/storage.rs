//! Persisted editor session
//!
//! A small key-value abstraction standing in for browser local storage.
//! Each value is stored as JSON under `<namespace>:<key>`, and the keys are
//! read and written independently so one corrupt entry does not lose the rest.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::config::PlayroomConfig;
use crate::error::{PlayroomError, Result};
use crate::store::{EditorOrientation, EditorPosition, PersistSnapshot};

pub const KEY_CODE: &str = "code";
pub const KEY_EDITOR_POSITION: &str = "editorPosition";
pub const KEY_EDITOR_WIDTH: &str = "editorWidth";
pub const KEY_EDITOR_HEIGHT: &str = "editorHeight";
pub const KEY_EDITOR_ORIENTATION: &str = "editorOrientation";

pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON file holding every entry; rewritten on each `set`
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            BTreeMap::new()
        };
        debug!("Opened file store at {} ({} entries)", path.display(), entries.len());
        Ok(Self { path, entries })
    }

    /// `<data dir>/playroom/store.json`
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::data_local_dir()
            .ok_or_else(|| PlayroomError::storage("no local data directory"))?;
        Ok(base.join("playroom").join("store.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&self.entries)?)?;
        Ok(())
    }
}

/// Whatever a previous session left behind. Missing or unreadable keys are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredSession {
    pub code: Option<String>,
    pub editor_position: Option<EditorPosition>,
    pub editor_width: Option<u32>,
    pub editor_height: Option<u32>,
    pub editor_orientation: Option<EditorOrientation>,
}

/// One namespaced view of a backing store per playroom instance
pub struct SessionStore {
    namespace: String,
    backend: Mutex<Box<dyn KeyValueStore>>,
}

impl SessionStore {
    pub fn new(namespace: impl Into<String>, backend: impl KeyValueStore + 'static) -> Self {
        Self {
            namespace: namespace.into(),
            backend: Mutex::new(Box::new(backend)),
        }
    }

    pub fn in_memory(namespace: impl Into<String>) -> Self {
        Self::new(namespace, MemoryStore::new())
    }

    /// Namespaced by the config's storage key
    pub fn for_config(config: &PlayroomConfig, backend: impl KeyValueStore + 'static) -> Self {
        Self::new(config.storage_namespace(), backend)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    fn read_key<T: DeserializeOwned>(&self, backend: &dyn KeyValueStore, key: &str) -> Option<T> {
        let raw = match backend.get(&self.scoped(key)) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("Failed to read '{}' from store: {}", key, e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring unreadable stored '{}': {}", key, e);
                None
            }
        }
    }

    fn write_key<T: Serialize>(
        &self,
        backend: &mut dyn KeyValueStore,
        key: &str,
        value: &T,
    ) -> Result<()> {
        backend.set(&self.scoped(key), &serde_json::to_string(value)?)
    }

    pub fn read(&self) -> Result<StoredSession> {
        let backend = self
            .backend
            .lock()
            .map_err(|_| PlayroomError::storage("store lock poisoned"))?;
        let backend = backend.as_ref();
        Ok(StoredSession {
            code: self.read_key(backend, KEY_CODE),
            editor_position: self.read_key(backend, KEY_EDITOR_POSITION),
            editor_width: self.read_key(backend, KEY_EDITOR_WIDTH),
            editor_height: self.read_key(backend, KEY_EDITOR_HEIGHT),
            editor_orientation: self.read_key(backend, KEY_EDITOR_ORIENTATION),
        })
    }

    pub fn write(&self, snapshot: &PersistSnapshot) -> Result<()> {
        let mut backend = self
            .backend
            .lock()
            .map_err(|_| PlayroomError::storage("store lock poisoned"))?;
        let backend = backend.as_mut();
        self.write_key(backend, KEY_CODE, &snapshot.code)?;
        self.write_key(backend, KEY_EDITOR_POSITION, &snapshot.editor_position)?;
        self.write_key(backend, KEY_EDITOR_WIDTH, &snapshot.editor_width)?;
        self.write_key(backend, KEY_EDITOR_HEIGHT, &snapshot.editor_height)?;
        self.write_key(backend, KEY_EDITOR_ORIENTATION, &snapshot.editor_orientation)?;
        debug!("Persisted session to '{}'", self.namespace);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn snapshot() -> PersistSnapshot {
        PersistSnapshot {
            code: "<Button />".into(),
            editor_position: EditorPosition::Right,
            editor_width: 480,
            editor_height: 300,
            editor_orientation: EditorOrientation::Vertical,
        }
    }

    #[test]
    fn test_empty_store_reads_nothing() {
        let store = SessionStore::in_memory("playroom-test");
        assert_eq!(store.read().unwrap(), StoredSession::default());
    }

    #[test]
    fn test_write_then_read() {
        let store = SessionStore::in_memory("playroom-test");
        store.write(&snapshot()).unwrap();
        let stored = store.read().unwrap();
        assert_eq!(stored.code.as_deref(), Some("<Button />"));
        assert_eq!(stored.editor_position, Some(EditorPosition::Right));
        assert_eq!(stored.editor_width, Some(480));
        assert_eq!(stored.editor_orientation, Some(EditorOrientation::Vertical));
    }

    #[test]
    fn test_corrupt_key_is_skipped() {
        let mut backend = MemoryStore::new();
        backend.set("ns:editorWidth", "not json").unwrap();
        backend.set("ns:code", "\"<a />\"").unwrap();
        let store = SessionStore::new("ns", backend);
        let stored = store.read().unwrap();
        assert_eq!(stored.editor_width, None);
        assert_eq!(stored.code.as_deref(), Some("<a />"));
    }

    #[test]
    fn test_namespaces_do_not_collide() {
        let mut backend = MemoryStore::new();
        backend.set("playroom-a:code", "\"<A />\"").unwrap();
        let store = SessionStore::new("playroom-b", backend);
        assert_eq!(store.read().unwrap().code, None);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store.json");
        let config = PlayroomConfig::default();
        {
            let file = FileStore::open(&path).unwrap();
            assert_eq!(file.path(), path.as_path());
            let store = SessionStore::for_config(&config, file);
            store.write(&snapshot()).unwrap();
        }
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .contains("playroom-playroom:code"));
        let store = SessionStore::for_config(&config, FileStore::open(&path).unwrap());
        assert_eq!(store.read().unwrap().code.as_deref(), Some("<Button />"));
    }
}
