//! Settings store implementations.
//!
//! The engine reads settings once at start and then follows change
//! notifications, which reach it as
//! [`HostEvent::SettingsChanged`](crate::dom::HostEvent::SettingsChanged).
//! A store only answers reads and writes; whoever drives the host decides
//! when to deliver the change a write or reload produced.

use crate::model::{SettingsChange, SettingsMap, StoreError};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key/value settings store.
pub trait SettingsStore {
    /// Current values; keys the store lacks are filled from `defaults`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be read.
    fn get(&self, defaults: &SettingsMap) -> Result<SettingsMap, StoreError>;

    /// Merge `partial` into the store.
    ///
    /// Returns the change notification the write produces: only keys whose
    /// value actually changed are listed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be written.
    fn set(&mut self, partial: SettingsMap) -> Result<SettingsChange, StoreError>;
}

/// In-process store.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryStore {
    values: SettingsMap,
    available: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty, reachable store.
    pub fn new() -> Self {
        Self {
            values: SettingsMap::new(),
            available: true,
        }
    }

    /// Store pre-filled with `values`.
    pub fn with_values(values: SettingsMap) -> Self {
        Self {
            values,
            available: true,
        }
    }

    /// Store that fails every call.
    pub fn unavailable() -> Self {
        Self {
            values: SettingsMap::new(),
            available: false,
        }
    }

    /// Make the store reachable or not.
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, defaults: &SettingsMap) -> Result<SettingsMap, StoreError> {
        if !self.available {
            return Err(StoreError::Unavailable);
        }
        Ok(fill_defaults(&self.values, defaults))
    }

    fn set(&mut self, partial: SettingsMap) -> Result<SettingsChange, StoreError> {
        if !self.available {
            return Err(StoreError::Unavailable);
        }
        Ok(merge(&mut self.values, partial))
    }
}

/// Store backed by a TOML file of camelCase keys:
///
/// ```toml
/// maxVisible = 10
/// batchSize = 10
/// autoloadOnScroll = true
/// hideOldestOnNew = true
/// ```
///
/// A missing file reads as empty. External edits are picked up by
/// [`FileStore::reload`], which yields the change since the last read.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    last_seen: SettingsMap,
}

impl FileStore {
    /// Open a store at `path`, remembering its current contents.
    ///
    /// An unreadable file is remembered as empty; the error resurfaces on
    /// the next [`SettingsStore::get`].
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let last_seen = match read_values(&path) {
            Ok(values) => values,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "settings file unreadable at open");
                SettingsMap::new()
            }
        };
        Self { path, last_seen }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file; `Some(change)` if any value differs from the last read.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file cannot be read or parsed.
    pub fn reload(&mut self) -> Result<Option<SettingsChange>, StoreError> {
        let current = read_values(&self.path)?;
        let mut keys: Vec<String> = current
            .iter()
            .filter(|(key, value)| self.last_seen.get(*key) != Some(*value))
            .map(|(key, _)| key.clone())
            .collect();
        keys.extend(
            self.last_seen
                .keys()
                .filter(|key| !current.contains_key(*key))
                .cloned(),
        );
        self.last_seen = current.clone();
        if keys.is_empty() {
            return Ok(None);
        }
        Ok(Some(SettingsChange {
            keys,
            values: current,
        }))
    }
}

impl SettingsStore for FileStore {
    fn get(&self, defaults: &SettingsMap) -> Result<SettingsMap, StoreError> {
        Ok(fill_defaults(&read_values(&self.path)?, defaults))
    }

    fn set(&mut self, partial: SettingsMap) -> Result<SettingsChange, StoreError> {
        let mut values = read_values(&self.path)?;
        let change = merge(&mut values, partial);
        write_values(&self.path, &values)?;
        self.last_seen = values;
        Ok(change)
    }
}

fn fill_defaults(values: &SettingsMap, defaults: &SettingsMap) -> SettingsMap {
    let mut out = defaults.clone();
    for (key, value) in values {
        out.insert(key.clone(), value.clone());
    }
    out
}

fn merge(values: &mut SettingsMap, partial: SettingsMap) -> SettingsChange {
    let mut keys = Vec::new();
    for (key, value) in partial {
        if values.get(&key) != Some(&value) {
            keys.push(key.clone());
            values.insert(key, value);
        }
    }
    SettingsChange {
        keys,
        values: values.clone(),
    }
}

fn read_values(path: &Path) -> Result<SettingsMap, StoreError> {
    if !path.exists() {
        return Ok(SettingsMap::new());
    }
    let contents = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = toml::from_str(&contents).map_err(|e| StoreError::Malformed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::Malformed {
            path: path.to_path_buf(),
            reason: "expected a table of settings".to_string(),
        }),
    }
}

fn write_values(path: &Path, values: &SettingsMap) -> Result<(), StoreError> {
    // TOML has no null
    let table: SettingsMap = values
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let contents = toml::to_string(&table).map_err(|e| StoreError::Malformed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, contents).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}
