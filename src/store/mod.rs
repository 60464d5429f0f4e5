//! Persistence interfaces consumed by the core, plus the file-backed
//! preference store implementation.

pub mod database;
pub mod preferences;

pub use database::{BatchTransaction, DatabaseError};
pub use preferences::{FilePreferenceStore, PreferenceEditor, PreferenceStore, StoreError};
