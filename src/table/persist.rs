//! Client-local persistence of column visibility.
//!
//! Keys are built from a namespace, the route path and the ordered list of
//! all leaf column ids, so two tables with different schemas never share
//! preferences. Values are JSON maps of column id to visibility.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::permission::normalize_url;
use crate::{Error, Result};

/// String key-value storage, like a browser's local storage.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Process-local storage, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| Error::Internal("storage lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| Error::Internal("storage lock poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Storage backed by a single JSON object file.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<Map<String, Value>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            _ => {
                debug!(path = %self.path.display(), "Storage file is not a JSON object, starting over");
                Ok(Map::new())
            }
        }
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::Internal("storage lock poisoned".into()))?;
        let map = self.read_map()?;
        Ok(map.get(key).and_then(Value::as_str).map(str::to_string))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::Internal("storage lock poisoned".into()))?;
        let mut map = self.read_map()?;
        map.insert(key.to_string(), Value::String(value.to_string()));

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&Value::Object(map))?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Storage key for a table's visibility map.
pub fn visibility_key<S: AsRef<str>>(namespace: &str, route: &str, column_ids: &[S]) -> String {
    let ids: Vec<&str> = column_ids.iter().map(|id| id.as_ref()).collect();
    format!("{namespace}:{}:{}", normalize_url(route), ids.join(","))
}

/// Typed reads and writes of one table's visibility map.
#[derive(Clone)]
pub struct VisibilityStore {
    storage: Arc<dyn Storage>,
    key: String,
}

impl fmt::Debug for VisibilityStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisibilityStore")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl VisibilityStore {
    pub fn new<S: AsRef<str>>(
        storage: Arc<dyn Storage>,
        namespace: &str,
        route: &str,
        column_ids: &[S],
    ) -> Self {
        Self {
            storage,
            key: visibility_key(namespace, route, column_ids),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The stored map, or `None` when absent, unreadable or malformed.
    pub fn load(&self) -> Option<BTreeMap<String, bool>> {
        let raw = match self.storage.get(&self.key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key = %self.key, "Failed to read column visibility: {e}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(map) => Some(map),
            Err(e) => {
                debug!(key = %self.key, "Discarding malformed column visibility: {e}");
                None
            }
        }
    }

    /// Write the full map; failures are logged, never returned.
    pub fn save(&self, visibility: &BTreeMap<String, bool>) {
        let result = serde_json::to_string(visibility)
            .map_err(Error::from)
            .and_then(|json| self.storage.set(&self.key, &json));
        if let Err(e) = result {
            warn!(key = %self.key, "Failed to persist column visibility: {e}");
        }
    }
}
