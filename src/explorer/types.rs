//! Wire types returned by a blockchain explorer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One confirmed transaction as reported by the explorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerTransaction {
    /// The transaction hash.
    pub hash: String,
    /// Ledger round (block height) the transaction was confirmed in.
    pub round: u64,
    /// Raw transaction payload as a hex string, when the explorer includes it.
    #[serde(default)]
    pub raw: Option<String>,
    /// Confirmation timestamp, when the explorer reports one.
    #[serde(rename = "confirmedAt", default)]
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Fee paid, in the chain's base unit.
    #[serde(default)]
    pub fee: Option<u64>,
}

/// One bounded batch of transactions. The explorer enforces its own page
/// size and signals further pages through `has_next`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionPage {
    pub transactions: Vec<ExplorerTransaction>,
    #[serde(rename = "hasNext", default)]
    pub has_next: bool,
}

/// Account summary as reported by the explorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerAccount {
    pub address: String,
    pub balance: u64,
    #[serde(rename = "currentRound", default)]
    pub current_round: u64,
}

/// Errors propagated opaquely from the explorer. The synchronizer performs
/// no retries of its own.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExplorerError {
    #[error("explorer request failed: {0}")]
    Request(String),

    #[error("explorer returned no data")]
    NoData,

    #[error("malformed explorer response: {0}")]
    Malformed(String),
}
