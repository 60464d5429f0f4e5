//! Preference store consumed by the keychain and the synchronizer.
//!
//! The store is a small byte-valued key/value surface with batched, atomic
//! writes: mutations are staged on an editor and land together on commit.
//! [`FilePreferenceStore`] is the file-backed implementation, persisting one
//! JSON document and replacing it whole through a temp-file rename so a
//! half-written file never becomes the current state.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt preference file: {0}")]
    Corrupt(String),
}

/// Byte-valued preference storage.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Start a batch of mutations; nothing is visible until `commit`.
    fn edit(&self) -> Box<dyn PreferenceEditor + '_>;
}

/// Staged preference mutations, applied atomically on commit.
pub trait PreferenceEditor {
    fn put(&mut self, key: &str, value: Vec<u8>);

    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[derive(Serialize, Deserialize)]
struct StoreDocument {
    updated_at: String,
    entries: BTreeMap<String, String>,
}

/// File-backed preference store with an in-memory mirror.
pub struct FilePreferenceStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    file: Option<PathBuf>,
}

impl FilePreferenceStore {
    /// Open (or create) a store backed by `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut entries = HashMap::new();

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let document: StoreDocument = serde_json::from_str(&content)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
            for (key, value) in document.entries {
                let bytes = hex::decode(&value).map_err(|e| {
                    StoreError::Corrupt(format!("entry {key} is not valid hex: {e}"))
                })?;
                entries.insert(key, bytes);
            }
            info!(
                "Loaded {} preference entries from {:?}",
                entries.len(),
                path
            );
        }

        Ok(Self {
            entries: Mutex::new(entries),
            file: Some(path),
        })
    }

    /// Store without a backing file, for tests and ephemeral accounts.
    pub fn in_memory() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            file: None,
        }
    }

    fn persist(&self, entries: &HashMap<String, Vec<u8>>) -> Result<(), StoreError> {
        let Some(path) = &self.file else {
            return Ok(());
        };

        let document = StoreDocument {
            updated_at: chrono::Utc::now().to_rfc3339(),
            entries: entries
                .iter()
                .map(|(key, value)| (key.clone(), hex::encode(value)))
                .collect(),
        };
        let content = serde_json::to_string_pretty(&document)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, path)?;
        debug!("Persisted {} preference entries to {:?}", entries.len(), path);
        Ok(())
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn edit(&self) -> Box<dyn PreferenceEditor + '_> {
        Box::new(FileEditor {
            store: self,
            staged: Vec::new(),
        })
    }
}

struct FileEditor<'a> {
    store: &'a FilePreferenceStore,
    staged: Vec<(String, Vec<u8>)>,
}

impl PreferenceEditor for FileEditor<'_> {
    fn put(&mut self, key: &str, value: Vec<u8>) {
        self.staged.push((key.to_string(), value));
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut entries = self.store.entries.lock().unwrap();
        // Apply to a copy first: a failed file write must not leave the
        // in-memory view ahead of the durable one.
        let mut next = entries.clone();
        for (key, value) in self.staged {
            next.insert(key, value);
        }
        self.store.persist(&next)?;
        *entries = next;
        Ok(())
    }
}
