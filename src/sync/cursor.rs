//! Per-account synchronization cursor persistence.

use std::sync::Arc;

use tracing::debug;

use super::SyncError;
use crate::store::PreferenceStore;

/// Cursor value used before any batch has been committed.
pub const GENESIS_ROUND: u64 = 0;

/// Persisted per-account cursor, namespaced away from other store users.
#[derive(Clone)]
pub struct SyncCursorStore {
    store: Arc<dyn PreferenceStore>,
    namespace: String,
}

impl SyncCursorStore {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self {
            store,
            namespace: "sync".to_string(),
        }
    }

    fn key(&self, account_id: &str) -> String {
        format!("{}.{}.cursor", self.namespace, account_id)
    }

    pub fn load(&self, account_id: &str) -> Result<Option<u64>, SyncError> {
        match self.store.get(&self.key(account_id)) {
            Some(bytes) => {
                let round = bincode::deserialize(&bytes)
                    .map_err(|e| SyncError::Store(e.to_string()))?;
                Ok(Some(round))
            }
            None => Ok(None),
        }
    }

    pub fn save(&self, account_id: &str, round: u64) -> Result<(), SyncError> {
        let bytes = bincode::serialize(&round).map_err(|e| SyncError::Store(e.to_string()))?;
        let mut editor = self.store.edit();
        editor.put(&self.key(account_id), bytes);
        editor
            .commit()
            .map_err(|e| SyncError::Store(e.to_string()))?;
        debug!("Persisted sync cursor for account {} at round {}", account_id, round);
        Ok(())
    }
}
