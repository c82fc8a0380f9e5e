//! A name-keyed arena for sharing policy state (circuit breakers, named
//! policy wraps) across handlers that only hold the name, not the state.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("entry '{0}' already registered")]
    AlreadyExists(String),
    #[error("entry '{0}' not found")]
    NotFound(String),
    #[error("entry '{0}' registered with a different type")]
    WrongType(String),
}

/// A name → `T` map. `T` is typically `Arc<SomeState>` so lookups are cheap
/// clones; the registry itself holds `Arc<dyn Any>` so a single registry
/// instance can host heterogeneous policy kinds (circuit states, policy
/// wraps) under one namespace if desired, via [`Registry::get`]'s downcast.
pub struct Registry {
    entries: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn add<T: Any + Send + Sync>(
        &self,
        name: impl Into<String>,
        value: Arc<T>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let mut entries = self.entries.write().unwrap();
        if entries.contains_key(&name) {
            return Err(RegistryError::AlreadyExists(name));
        }
        entries.insert(name, value);
        Ok(())
    }

    pub fn add_or_replace<T: Any + Send + Sync>(&self, name: impl Into<String>, value: Arc<T>) {
        self.entries.write().unwrap().insert(name.into(), value);
    }

    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, RegistryError> {
        let entries = self.entries.read().unwrap();
        let entry = entries
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        entry
            .clone()
            .downcast::<T>()
            .map_err(|_| RegistryError::WrongType(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().unwrap().contains_key(name)
    }

    pub fn remove(&self, name: &str) -> bool {
        self.entries.write().unwrap().remove(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.read().unwrap().keys().cloned().collect()
    }

    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }
}

/// A process-wide default registry, for callers who don't want to thread an
/// explicit instance through their application. Tests should construct a
/// fresh [`Registry::new()`] instead of relying on this to avoid
/// cross-test pollution.
pub fn default_registry() -> &'static Registry {
    static DEFAULT: std::sync::OnceLock<Registry> = std::sync::OnceLock::new();
    DEFAULT.get_or_init(Registry::new)
}
