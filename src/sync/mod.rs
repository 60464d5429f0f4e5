//! Incremental account synchronization.
//!
//! One [`AccountSynchronizer`] drives a single account at a time through a
//! cursor-based batch loop against a [`BlockchainExplorer`], persisting its
//! progress so an interrupted run resumes where the last committed batch
//! left off. Completion is reported through a [`SyncNotifier`] resolved
//! exactly once per run.

pub mod cursor;
pub mod notifier;
pub mod progress;
pub mod synchronizer;

pub use cursor::{GENESIS_ROUND, SyncCursorStore};
pub use notifier::SyncNotifier;
pub use progress::SyncReport;
pub use synchronizer::{AccountSynchronizer, SyncableAccount};

use crate::explorer::ExplorerError;

/// Errors surfaced through the synchronization notifier.
///
/// Cloneable because every notifier clone for a run observes the same
/// outcome; store and database failures are carried as rendered messages.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    #[error("synchronizer already in use for account {0}")]
    Busy(String),

    #[error("explorer error: {0}")]
    Explorer(#[from] ExplorerError),

    #[error("database error: {0}")]
    Database(String),

    #[error("preference store error: {0}")]
    Store(String),

    #[error("synchronization aborted before completion")]
    Aborted,
}
