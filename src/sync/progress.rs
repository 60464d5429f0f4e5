//! Progress tracking for synchronization runs.
//!
//! Records batches, transactions and the round range observed during one
//! run, logs progress at intervals, and folds into the final [`SyncReport`]
//! delivered through the notifier.

use tracing::info;

/// Running counters for one synchronization run.
#[derive(Debug, Clone)]
pub(crate) struct SyncProgress {
    start_round: u64,
    highest_round: u64,
    batches: usize,
    transactions_seen: usize,
    transactions_skipped: usize,
    last_logged_round: u64,
}

impl SyncProgress {
    pub fn new(start_round: u64) -> Self {
        Self {
            start_round,
            highest_round: start_round,
            batches: 0,
            transactions_seen: 0,
            transactions_skipped: 0,
            last_logged_round: start_round,
        }
    }

    pub fn record_batch(&mut self) {
        self.batches += 1;
    }

    pub fn record_transaction(&mut self, round: u64) {
        self.transactions_seen += 1;
        self.highest_round = self.highest_round.max(round);
    }

    pub fn record_skipped(&mut self) {
        self.transactions_skipped += 1;
    }

    /// Log progress every 1000 rounds, or immediately when forced.
    pub fn log_progress(&mut self, force: bool) {
        let rounds_since_log = self.highest_round.saturating_sub(self.last_logged_round);
        if (force || rounds_since_log >= 1000) && self.transactions_seen > 0 {
            info!(
                "Sync progress: {} transactions in {} batches up to round {}",
                self.transactions_seen, self.batches, self.highest_round
            );
            self.last_logged_round = self.highest_round;
        }
    }

    pub fn into_report(self, account_id: String, had_transactions: bool) -> SyncReport {
        SyncReport {
            account_id,
            start_round: self.start_round,
            highest_round: self.highest_round,
            batches: self.batches,
            transactions_seen: self.transactions_seen,
            transactions_skipped: self.transactions_skipped,
            had_transactions,
        }
    }
}

/// Outcome of one completed synchronization run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub account_id: String,
    pub start_round: u64,
    pub highest_round: u64,
    pub batches: usize,
    pub transactions_seen: usize,
    pub transactions_skipped: usize,
    /// Whether any transaction was observed across the whole run.
    pub had_transactions: bool,
}

impl SyncReport {
    pub fn summary(&self) -> String {
        format!(
            "account {} synced from round {} to {}: {} transactions in {} batches{}",
            self.account_id,
            self.start_round,
            self.highest_round,
            self.transactions_seen,
            self.batches,
            if self.transactions_skipped == 0 {
                String::new()
            } else {
                format!(" ({} skipped)", self.transactions_skipped)
            }
        )
    }
}
