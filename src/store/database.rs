//! Database session consumed by the synchronizer.
//!
//! Row mapping and SQL schema live outside this crate; the synchronizer only
//! needs a scoped transaction it can fill with one batch of explorer
//! transactions and then commit or roll back as a unit.

use async_trait::async_trait;

use crate::explorer::ExplorerTransaction;

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// One row failed to insert; the surrounding batch can continue.
    #[error("row insertion failed: {0}")]
    Insert(String),

    /// The batch transaction itself failed; nothing in it is durable.
    #[error("batch transaction failed: {0}")]
    Transaction(String),

    #[error("database connection failed: {0}")]
    Connection(String),
}

/// A scoped database transaction covering one synchronization batch.
#[async_trait]
pub trait BatchTransaction: Send {
    async fn put_transaction(&mut self, tx: &ExplorerTransaction) -> Result<(), DatabaseError>;

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError>;

    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError>;
}
