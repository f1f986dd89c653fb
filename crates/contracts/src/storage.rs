//! Persistent key-value store contract
//!
//! The store is shared between pipeline instances (and processes sharing the
//! same backing file). Values are opaque JSON; typed helpers live on
//! [`SharedStorage`], which also applies the `"<prefix>_<key>"` namespace.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::ContractError;

/// Raw key-value backend
///
/// Implementations must be safe to call from any thread.
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when absent
    fn get(&self, key: &str) -> Result<Option<Value>, ContractError>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: Value) -> Result<(), ContractError>;

    /// Delete a value (absent keys are not an error)
    fn remove(&self, key: &str) -> Result<(), ContractError>;

    /// Read-modify-write one key, returning the value it held before
    ///
    /// `apply` sees the current value and returns the replacement, or `None`
    /// to leave the key untouched. The default is a plain get then set;
    /// backends shared between handles hold their lock across both steps.
    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<&Value>) -> Option<Value>,
    ) -> Result<Option<Value>, ContractError> {
        let previous = self.get(key)?;
        if let Some(next) = apply(previous.as_ref()) {
            self.set(key, next)?;
        }
        Ok(previous)
    }
}

/// Namespaced, typed view over a [`KeyValueStore`]
#[derive(Clone)]
pub struct SharedStorage {
    prefix: String,
    store: Arc<dyn KeyValueStore>,
}

impl fmt::Debug for SharedStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedStorage")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl SharedStorage {
    pub fn new(prefix: impl Into<String>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            prefix: prefix.into(),
            store,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Fully qualified key as stored in the backend
    pub fn namespaced(&self, key: &str) -> String {
        format!("{}_{}", self.prefix, key)
    }

    pub fn get_value(&self, key: &str) -> Result<Option<Value>, ContractError> {
        self.store.get(&self.namespaced(key))
    }

    pub fn set_value(&self, key: &str, value: Value) -> Result<(), ContractError> {
        self.store.set(&self.namespaced(key), value)
    }

    pub fn remove(&self, key: &str) -> Result<(), ContractError> {
        self.store.remove(&self.namespaced(key))
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ContractError> {
        Ok(self.get_value(key)?.and_then(|v| v.as_bool()))
    }

    pub fn set_bool(&self, key: &str, value: bool) -> Result<(), ContractError> {
        self.set_value(key, Value::Bool(value))
    }

    pub fn get_int(&self, key: &str) -> Result<Option<i64>, ContractError> {
        Ok(self.get_value(key)?.and_then(|v| v.as_i64()))
    }

    pub fn set_int(&self, key: &str, value: i64) -> Result<(), ContractError> {
        self.set_value(key, Value::from(value))
    }

    pub fn get_string(&self, key: &str) -> Result<Option<String>, ContractError> {
        Ok(self
            .get_value(key)?
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    pub fn set_string(&self, key: &str, value: &str) -> Result<(), ContractError> {
        self.set_value(key, Value::from(value))
    }

    /// Increment a counter and return the new value
    pub fn increment(&self, key: &str) -> Result<i64, ContractError> {
        let mut next = 0;
        self.store.update(&self.namespaced(key), &mut |current| {
            next = current.and_then(Value::as_i64).unwrap_or(0).saturating_add(1);
            Some(Value::from(next))
        })?;
        Ok(next)
    }

    /// Set a boolean flag to `true`; returns whether this call flipped it
    pub fn set_flag_once(&self, key: &str) -> Result<bool, ContractError> {
        let previous = self.store.update(&self.namespaced(key), &mut |current| {
            match current.and_then(Value::as_bool) {
                Some(true) => None,
                _ => Some(Value::Bool(true)),
            }
        })?;
        Ok(previous.and_then(|v| v.as_bool()) != Some(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MapStore(Mutex<HashMap<String, Value>>);

    impl KeyValueStore for MapStore {
        fn get(&self, key: &str) -> Result<Option<Value>, ContractError> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }

        fn set(&self, key: &str, value: Value) -> Result<(), ContractError> {
            self.0.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }

        fn remove(&self, key: &str) -> Result<(), ContractError> {
            self.0.lock().unwrap().remove(key);
            Ok(())
        }
    }

    #[test]
    fn test_keys_are_namespaced() {
        let backend = Arc::new(MapStore::default());
        let storage = SharedStorage::new("app", backend.clone());

        storage.set_bool("onlyOnce_signup", true).unwrap();

        assert!(backend.0.lock().unwrap().contains_key("app_onlyOnce_signup"));
        assert_eq!(storage.get_bool("onlyOnce_signup").unwrap(), Some(true));
    }

    #[test]
    fn test_increment_counter() {
        let storage = SharedStorage::new("app", Arc::new(MapStore::default()));

        assert_eq!(storage.increment("launchCount").unwrap(), 1);
        assert_eq!(storage.increment("launchCount").unwrap(), 2);
        assert_eq!(storage.get_int("launchCount").unwrap(), Some(2));
    }

    #[test]
    fn test_set_flag_once_reports_first_writer() {
        let storage = SharedStorage::new("app", Arc::new(MapStore::default()));

        assert!(storage.set_flag_once("onlyOnce_signup").unwrap());
        assert!(!storage.set_flag_once("onlyOnce_signup").unwrap());
        assert_eq!(storage.get_bool("onlyOnce_signup").unwrap(), Some(true));

        storage.set_bool("onlyOnce_tour", false).unwrap();
        assert!(storage.set_flag_once("onlyOnce_tour").unwrap());
    }

    #[test]
    fn test_type_mismatch_reads_as_absent() {
        let storage = SharedStorage::new("app", Arc::new(MapStore::default()));
        storage.set_string("flag", "yes").unwrap();
        assert_eq!(storage.get_bool("flag").unwrap(), None);
        assert_eq!(storage.get_string("flag").unwrap().as_deref(), Some("yes"));
    }
}
