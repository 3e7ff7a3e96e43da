//! Named-system registry (the store gateway).
//!
//! A "system" is a named backing store connection. Every engine operation
//! routes to exactly one system per call; cross-system joins are not
//! supported. The registry always holds a `"default"` entry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{KvormError, KvormResult};
use crate::store::{KeyValueStore, StoreError};

/// Name of the system every registry is constructed with.
pub const DEFAULT_SYSTEM: &str = "default";

/// Maps system names to live store connections.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use kvorm::{MemoryStore, SystemRegistry, DEFAULT_SYSTEM};
///
/// let registry = SystemRegistry::new(Arc::new(MemoryStore::new()));
/// registry.register("stats", Arc::new(MemoryStore::new())).unwrap();
///
/// assert!(registry.resolve(DEFAULT_SYSTEM).is_ok());
/// assert!(registry.resolve("stats").is_ok());
/// assert!(registry.resolve("typo").unwrap_err().is_unknown_system());
/// ```
pub struct SystemRegistry {
    systems: RwLock<HashMap<String, Arc<dyn KeyValueStore>>>,
}

impl SystemRegistry {
    /// Creates a registry whose `"default"` system is the given store.
    #[must_use]
    pub fn new(default_store: Arc<dyn KeyValueStore>) -> Self {
        let mut systems: HashMap<String, Arc<dyn KeyValueStore>> = HashMap::new();
        systems.insert(DEFAULT_SYSTEM.to_string(), default_store);
        Self {
            systems: RwLock::new(systems),
        }
    }

    /// Registers (or replaces) a named system.
    ///
    /// # Errors
    ///
    /// Fails only if the registry lock is poisoned.
    pub fn register(
        &self,
        name: impl Into<String>,
        store: Arc<dyn KeyValueStore>,
    ) -> KvormResult<()> {
        let mut systems = self
            .systems
            .write()
            .map_err(|_| StoreError::Backend("poisoned lock: systems".to_string()))?;
        systems.insert(name.into(), store);
        Ok(())
    }

    /// Resolves a system name to its store connection.
    ///
    /// # Errors
    ///
    /// Returns [`KvormError::UnknownSystem`] for a name that was never
    /// registered.
    pub fn resolve(&self, name: &str) -> KvormResult<Arc<dyn KeyValueStore>> {
        let systems = self
            .systems
            .read()
            .map_err(|_| StoreError::Backend("poisoned lock: systems".to_string()))?;
        systems
            .get(name)
            .cloned()
            .ok_or_else(|| KvormError::UnknownSystem {
                name: name.to_string(),
            })
    }

    /// Registered system names, sorted.
    ///
    /// # Errors
    ///
    /// Fails only if the registry lock is poisoned.
    pub fn names(&self) -> KvormResult<Vec<String>> {
        let systems = self
            .systems
            .read()
            .map_err(|_| StoreError::Backend("poisoned lock: systems".to_string()))?;
        let mut names: Vec<String> = systems.keys().cloned().collect();
        names.sort_unstable();
        Ok(names)
    }
}

impl std::fmt::Debug for SystemRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = self.names().unwrap_or_default();
        f.debug_struct("SystemRegistry")
            .field("systems", &names)
            .finish()
    }
}
