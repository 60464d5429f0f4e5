//! Blockchain explorer interface.
//!
//! The synchronizer consumes an explorer through the [`BlockchainExplorer`]
//! trait; concrete HTTP/JSON clients live outside this crate. Errors cross
//! the trait opaquely and are never retried here.

pub mod registry;
pub mod types;

pub use registry::{ExplorerConfig, ExplorerRegistry};
pub use types::{ExplorerAccount, ExplorerError, ExplorerTransaction, TransactionPage};

use async_trait::async_trait;

/// Remote chain-history and broadcast surface consumed by the synchronizer.
#[async_trait]
pub trait BlockchainExplorer: Send + Sync {
    /// One bounded batch of transactions touching `address`, starting at
    /// `min_round`. The explorer enforces its own page-size limit.
    async fn transactions_for_address(
        &self,
        address: &str,
        min_round: u64,
    ) -> Result<TransactionPage, ExplorerError>;

    async fn account(&self, address: &str) -> Result<ExplorerAccount, ExplorerError>;

    /// Broadcast a raw transaction, returning its hash.
    async fn push_transaction(&self, raw_transaction: &[u8]) -> Result<String, ExplorerError>;
}
