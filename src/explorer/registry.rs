//! Owned registry of live explorer instances.
//!
//! Explorer clients are expensive to set up (connection pools, session
//! state), so instances are shared per configuration. The registry owns its
//! entries outright and is keyed by a stable hash of the configuration;
//! entries leave only through explicit eviction.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use tracing::debug;

/// Identity of one explorer endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExplorerConfig {
    pub api_url: String,
    pub network: String,
    pub api_key: Option<String>,
}

impl ExplorerConfig {
    /// Stable key for registry lookups, derived from all identity fields.
    pub fn stable_hash(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// Shared explorer instances keyed by configuration.
pub struct ExplorerRegistry<E> {
    entries: Mutex<HashMap<u64, Arc<E>>>,
}

impl<E> ExplorerRegistry<E> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Existing instance for `config`, or the one produced by `build`.
    pub fn get_or_insert_with(&self, config: &ExplorerConfig, build: impl FnOnce() -> E) -> Arc<E> {
        let mut entries = self.entries.lock().unwrap();
        entries
            .entry(config.stable_hash())
            .or_insert_with(|| {
                debug!("Creating explorer instance for {}", config.api_url);
                Arc::new(build())
            })
            .clone()
    }

    /// Drop the instance registered for `config`, if any.
    pub fn evict(&self, config: &ExplorerConfig) -> bool {
        let removed = self
            .entries
            .lock()
            .unwrap()
            .remove(&config.stable_hash())
            .is_some();
        if removed {
            debug!("Evicted explorer instance for {}", config.api_url);
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

impl<E> Default for ExplorerRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}
