//! Key-value store backends
//!
//! - [`MemoryStore`]: process-local, cleared on restart
//! - [`JsonFileStore`]: one JSON object on disk, survives restarts and can be
//!   shared by several pipelines (or processes) pointing at the same file

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use fs2::FileExt;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, instrument, warn};

use contracts::{ContractError, KeyValueStore, SharedStorage, StorageConfig};

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, ContractError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), ContractError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ContractError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.remove(key);
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<&Value>) -> Option<Value>,
    ) -> Result<Option<Value>, ContractError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = values.get(key).cloned();
        if let Some(next) = apply(previous.as_ref()) {
            values.insert(key.to_string(), next);
        }
        Ok(previous)
    }
}

/// File-backed store
///
/// Every read goes to disk so that writes made through another handle on
/// the same file are visible. Writes hold an advisory lock on a sidecar
/// `<file>.lock` across load, modify and save, and replace the file through
/// a uniquely named temp file in the same directory, so handles in any
/// number of threads or processes never drop each other's keys.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonFileStore {
    /// Open (or lazily create) a store at `path`
    ///
    /// # Errors
    /// Returns IO error if the parent directory cannot be created
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ContractError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut lock_name = OsString::from(path.as_os_str());
        lock_name.push(".lock");
        debug!(path = %path.display(), "JsonFileStore opened");
        Ok(Self {
            path,
            lock_path: PathBuf::from(lock_name),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn load(&self) -> Result<Map<String, Value>, ContractError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ContractError::storage(
                self.path.display().to_string(),
                "store file is not a JSON object",
            )),
            Err(e) => Err(ContractError::storage(
                self.path.display().to_string(),
                format!("corrupt store file: {e}"),
            )),
        }
    }

    fn save(&self, map: &Map<String, Value>) -> Result<(), ContractError> {
        let data = serde_json::to_vec_pretty(map)
            .map_err(|e| ContractError::storage(self.path.display().to_string(), e.to_string()))?;
        let mut tmp = NamedTempFile::new_in(self.dir())?;
        tmp.write_all(&data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(io::Error::from)?;
        Ok(())
    }

    /// Exclusive lock on the sidecar file, released when the file drops
    fn lock(&self) -> Result<File, ContractError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;
        FileExt::lock_exclusive(&file)?;
        Ok(file)
    }

    fn modify<T>(
        &self,
        apply: impl FnOnce(&mut Map<String, Value>) -> (T, bool),
    ) -> Result<T, ContractError> {
        let lock = self.lock()?;
        let result = self.load().and_then(|mut map| {
            let (out, changed) = apply(&mut map);
            if changed {
                self.save(&map)?;
            }
            Ok(out)
        });
        if let Err(e) = FileExt::unlock(&lock) {
            warn!(path = %self.lock_path.display(), error = %e, "Failed to release store lock");
        }
        result
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, ContractError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> Result<(), ContractError> {
        self.modify(|map| {
            map.insert(key.to_string(), value);
            ((), true)
        })
    }

    fn remove(&self, key: &str) -> Result<(), ContractError> {
        self.modify(|map| {
            let existed = map.remove(key).is_some();
            ((), existed)
        })
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<&Value>) -> Option<Value>,
    ) -> Result<Option<Value>, ContractError> {
        self.modify(|map| {
            let previous = map.get(key).cloned();
            match apply(previous.as_ref()) {
                Some(next) => {
                    map.insert(key.to_string(), next);
                    (previous, true)
                }
                None => (previous, false),
            }
        })
    }
}

/// Build the namespaced storage described by `config`
///
/// # Errors
/// Returns IO error if a file-backed store cannot be opened
#[instrument(name = "open_storage", skip(config), fields(prefix = %config.prefix))]
pub fn open_storage(config: &StorageConfig) -> Result<SharedStorage, ContractError> {
    let backend: Arc<dyn KeyValueStore> = match &config.path {
        Some(path) => Arc::new(JsonFileStore::open(path)?),
        None => Arc::new(MemoryStore::new()),
    };
    Ok(SharedStorage::new(config.prefix.clone(), backend))
}
