//! Key-value settings storage for the raw premium key.
//!
//! The licensing code only ever touches one key ([`PREMIUM_KEY_CONFIG_KEY`]).
//! Implementations are blocking; callers on an async runtime run them on the
//! blocking pool.

use crate::error::StoreError;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Settings key that holds the raw premium key string.
pub const PREMIUM_KEY_CONFIG_KEY: &str = "premiumKey";

/// A string key-value configuration store.
pub trait ConfigStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if nothing is stored under `key`.
    fn read_string(&self, key: &str) -> Result<String, StoreError>;

    /// Stores `value` under `key`, or clears the key when `value` is `None`.
    ///
    /// Clearing a key that holds nothing succeeds.
    fn write_string(&self, key: &str, value: Option<&str>) -> Result<(), StoreError>;
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryConfigStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn read_string(&self, key: &str) -> Result<String, StoreError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn write_string(&self, key: &str, value: Option<&str>) -> Result<(), StoreError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        match value {
            Some(v) => {
                values.insert(key.to_string(), v.to_string());
            }
            None => {
                values.remove(key);
            }
        }
        Ok(())
    }
}

/// Store backed by a JSON object of strings in a single settings file.
///
/// A missing file reads as an empty store. Writes go to a sibling temp file
/// that is renamed over the original, so a crash never leaves a torn file.
#[derive(Debug)]
pub struct JsonFileConfigStore {
    path: PathBuf,
    // serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl JsonFileConfigStore {
    /// Opens a store at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns `<config dir>/lockbox/settings.json`, if the platform has a config dir.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("lockbox").join("settings.json"))
    }

    /// Returns the settings file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(values)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl ConfigStore for JsonFileConfigStore {
    fn read_string(&self, key: &str) -> Result<String, StoreError> {
        self.load()?
            .remove(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn write_string(&self, key: &str, value: Option<&str>) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut values = self.load()?;
        let changed = match value {
            Some(v) => values.insert(key.to_string(), v.to_string()).as_deref() != Some(v),
            None => values.remove(key).is_some(),
        };
        if changed {
            self.save(&values)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_clear_absent_key_is_ok() {
        let store = MemoryConfigStore::new();
        store.write_string("k", None).unwrap();
        assert!(matches!(store.read_string("k"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn default_path_ends_with_settings_file() {
        if let Some(path) = JsonFileConfigStore::default_path() {
            assert!(path.ends_with("lockbox/settings.json"));
        }
    }
}
