//! Single-flight account synchronizer.
//!
//! The synchronizer binds to one account at a time. A second request for the
//! same account while a run is in flight joins it (the caller receives a
//! clone of the live notifier); a request for a different account fails with
//! [`SyncError::Busy`]. All explorer and database work runs on the
//! caller-supplied runtime handle; the synchronizer never spawns threads of
//! its own.
//!
//! Within a run, batches are processed strictly in cursor order and the
//! cursor advances only after the corresponding database commit succeeds, so
//! a failed run resumes from its last committed batch rather than from
//! genesis. A single malformed record is skipped, not fatal; a batch-level
//! commit failure aborts the run.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::SyncError;
use super::cursor::{GENESIS_ROUND, SyncCursorStore};
use super::notifier::{SyncNotifier, completion_channel};
use super::progress::{SyncProgress, SyncReport};
use crate::explorer::BlockchainExplorer;
use crate::store::{BatchTransaction, DatabaseError, PreferenceStore};

/// The account-side surface the synchronizer writes history into.
#[async_trait]
pub trait SyncableAccount: Send + Sync {
    /// Stable identifier used for cursor namespacing and busy reporting.
    fn account_id(&self) -> &str;

    /// Address whose transaction history is requested from the explorer.
    fn request_address(&self) -> &str;

    /// Open a scoped database transaction for one batch of inserts.
    async fn begin_batch(&self) -> Result<Box<dyn BatchTransaction>, DatabaseError>;
}

struct RunningSync {
    account_id: String,
    notifier: SyncNotifier,
}

pub struct AccountSynchronizer {
    explorer: Arc<dyn BlockchainExplorer>,
    cursors: SyncCursorStore,
    runtime: tokio::runtime::Handle,
    current: Arc<Mutex<Option<RunningSync>>>,
}

impl AccountSynchronizer {
    pub fn new(
        explorer: Arc<dyn BlockchainExplorer>,
        store: Arc<dyn PreferenceStore>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        Self {
            explorer,
            cursors: SyncCursorStore::new(store),
            runtime,
            current: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_synchronizing(&self) -> bool {
        self.current.lock().unwrap().is_some()
    }

    /// Start (or join) the synchronization of `account`.
    pub fn synchronize_account(
        &self,
        account: Arc<dyn SyncableAccount>,
    ) -> Result<SyncNotifier, SyncError> {
        let mut current = self.current.lock().unwrap();
        if let Some(running) = current.as_ref() {
            if running.account_id == account.account_id() {
                debug!(
                    "Joining in-flight synchronization for account {}",
                    running.account_id
                );
                return Ok(running.notifier.clone());
            }
            return Err(SyncError::Busy(running.account_id.clone()));
        }

        let (sender, notifier) = completion_channel();
        *current = Some(RunningSync {
            account_id: account.account_id().to_string(),
            notifier: notifier.clone(),
        });
        drop(current);

        let explorer = Arc::clone(&self.explorer);
        let cursors = self.cursors.clone();
        let slot = Arc::clone(&self.current);
        self.runtime.spawn(async move {
            let outcome =
                perform_synchronization(explorer.as_ref(), &cursors, account.as_ref()).await;
            match &outcome {
                Ok(report) => info!("Synchronization completed: {}", report.summary()),
                Err(e) => error!(
                    "Synchronization failed for account {}: {}",
                    account.account_id(),
                    e
                ),
            }
            // Return to idle before resolving, so a caller woken by the
            // notifier can immediately start a fresh run.
            slot.lock().unwrap().take();
            let _ = sender.send(Some(outcome));
        });

        Ok(notifier)
    }
}

async fn perform_synchronization(
    explorer: &dyn BlockchainExplorer,
    cursors: &SyncCursorStore,
    account: &dyn SyncableAccount,
) -> Result<SyncReport, SyncError> {
    let account_id = account.account_id().to_string();

    let mut cursor = match cursors.load(&account_id)? {
        Some(round) => round,
        None => {
            cursors.save(&account_id, GENESIS_ROUND)?;
            GENESIS_ROUND
        }
    };
    info!(
        "Starting synchronization for account {} from round {}",
        account_id, cursor
    );

    let mut progress = SyncProgress::new(cursor);
    let mut had_transactions = false;

    loop {
        let page = explorer
            .transactions_for_address(account.request_address(), cursor)
            .await?;
        progress.record_batch();

        let mut batch = account
            .begin_batch()
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;

        let mut lowest_round: Option<u64> = None;
        let mut highest_round = cursor;
        for tx in &page.transactions {
            lowest_round = Some(lowest_round.map_or(tx.round, |round| round.min(tx.round)));
            highest_round = highest_round.max(tx.round);

            if let Err(e) = batch.put_transaction(tx).await {
                // One malformed record must not block the account's history.
                warn!("Skipping transaction {}: {}", tx.hash, e);
                progress.record_skipped();
                continue;
            }
            progress.record_transaction(tx.round);
        }

        batch
            .commit()
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;
        cursors.save(&account_id, highest_round)?;

        had_transactions |= !page.transactions.is_empty();
        progress.log_progress(false);

        if !page.has_next {
            break;
        }
        match lowest_round {
            // The next request starts at the batch floor: records below the
            // current cursor may not have been retrieved yet.
            Some(lowest) => cursor = lowest,
            // An empty page cannot move the cursor; stop rather than loop.
            None => break,
        }
    }

    progress.log_progress(true);
    Ok(progress.into_report(account_id, had_transactions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explorer::{ExplorerAccount, ExplorerError, ExplorerTransaction, TransactionPage};
    use crate::store::FilePreferenceStore;
    use std::collections::{HashSet, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }

    fn tx(hash: &str, round: u64) -> ExplorerTransaction {
        ExplorerTransaction {
            hash: hash.to_string(),
            round,
            raw: None,
            confirmed_at: None,
            fee: None,
        }
    }

    fn page(transactions: Vec<ExplorerTransaction>, has_next: bool) -> TransactionPage {
        TransactionPage {
            transactions,
            has_next,
        }
    }

    struct ScriptedExplorer {
        pages: Mutex<VecDeque<TransactionPage>>,
        requests: Mutex<Vec<u64>>,
        gate: Option<Arc<tokio::sync::Semaphore>>,
    }

    impl ScriptedExplorer {
        fn new(pages: Vec<TransactionPage>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                requests: Mutex::new(Vec::new()),
                gate: None,
            }
        }

        fn gated(pages: Vec<TransactionPage>, gate: Arc<tokio::sync::Semaphore>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                requests: Mutex::new(Vec::new()),
                gate: Some(gate),
            }
        }

        fn requests(&self) -> Vec<u64> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BlockchainExplorer for ScriptedExplorer {
        async fn transactions_for_address(
            &self,
            _address: &str,
            min_round: u64,
        ) -> Result<TransactionPage, ExplorerError> {
            if let Some(gate) = &self.gate {
                gate.acquire().await.map_err(|_| ExplorerError::NoData)?.forget();
            }
            self.requests.lock().unwrap().push(min_round);
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(ExplorerError::NoData)
        }

        async fn account(&self, address: &str) -> Result<ExplorerAccount, ExplorerError> {
            Ok(ExplorerAccount {
                address: address.to_string(),
                balance: 0,
                current_round: 0,
            })
        }

        async fn push_transaction(&self, _raw: &[u8]) -> Result<String, ExplorerError> {
            Err(ExplorerError::NoData)
        }
    }

    struct MockAccount {
        id: String,
        committed: Arc<Mutex<Vec<String>>>,
        fail_hashes: HashSet<String>,
        fail_commit_on_batch: Option<usize>,
        batches_opened: AtomicUsize,
    }

    impl MockAccount {
        fn new(id: &str) -> Self {
            Self {
                id: id.to_string(),
                committed: Arc::new(Mutex::new(Vec::new())),
                fail_hashes: HashSet::new(),
                fail_commit_on_batch: None,
                batches_opened: AtomicUsize::new(0),
            }
        }
    }

    struct MockBatch {
        staged: Vec<String>,
        committed: Arc<Mutex<Vec<String>>>,
        fail_hashes: HashSet<String>,
        fail_commit: bool,
    }

    #[async_trait]
    impl BatchTransaction for MockBatch {
        async fn put_transaction(&mut self, tx: &ExplorerTransaction) -> Result<(), DatabaseError> {
            if self.fail_hashes.contains(&tx.hash) {
                return Err(DatabaseError::Insert(format!("malformed record {}", tx.hash)));
            }
            self.staged.push(tx.hash.clone());
            Ok(())
        }

        async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
            if self.fail_commit {
                return Err(DatabaseError::Transaction("connection lost".to_string()));
            }
            self.committed.lock().unwrap().extend(self.staged);
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> Result<(), DatabaseError> {
            Ok(())
        }
    }

    #[async_trait]
    impl SyncableAccount for MockAccount {
        fn account_id(&self) -> &str {
            &self.id
        }

        fn request_address(&self) -> &str {
            "addr-under-test"
        }

        async fn begin_batch(&self) -> Result<Box<dyn BatchTransaction>, DatabaseError> {
            let batch_number = self.batches_opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockBatch {
                staged: Vec::new(),
                committed: self.committed.clone(),
                fail_hashes: self.fail_hashes.clone(),
                fail_commit: self.fail_commit_on_batch == Some(batch_number),
            }))
        }
    }

    #[tokio::test]
    async fn syncs_batches_and_advances_cursor() {
        init_tracing();
        let explorer = Arc::new(ScriptedExplorer::new(vec![
            page(vec![tx("t5", 5), tx("t7", 7)], true),
            page(vec![tx("t8", 8)], false),
        ]));
        let store: Arc<dyn PreferenceStore> = Arc::new(FilePreferenceStore::in_memory());
        let account = Arc::new(MockAccount::new("acct-1"));
        let synchronizer = AccountSynchronizer::new(
            explorer.clone(),
            store.clone(),
            tokio::runtime::Handle::current(),
        );

        let mut notifier = synchronizer.synchronize_account(account.clone()).unwrap();
        let report = notifier.wait().await.unwrap();

        assert!(report.had_transactions);
        assert_eq!(report.batches, 2);
        assert_eq!(report.transactions_seen, 3);
        assert_eq!(
            *account.committed.lock().unwrap(),
            vec!["t5", "t7", "t8"]
        );
        // First request from genesis, second from the first batch's floor.
        assert_eq!(explorer.requests(), vec![0, 5]);
        // Cursor lands on the highest committed round.
        let cursors = SyncCursorStore::new(store);
        assert_eq!(cursors.load("acct-1").unwrap(), Some(8));
        assert!(!synchronizer.is_synchronizing());
    }

    #[tokio::test]
    async fn concurrent_requests_join_and_busy() {
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let explorer = Arc::new(ScriptedExplorer::gated(
            vec![page(vec![tx("t1", 1)], false)],
            gate.clone(),
        ));
        let store: Arc<dyn PreferenceStore> = Arc::new(FilePreferenceStore::in_memory());
        let account_a = Arc::new(MockAccount::new("acct-a"));
        let account_b = Arc::new(MockAccount::new("acct-b"));
        let synchronizer =
            AccountSynchronizer::new(explorer, store, tokio::runtime::Handle::current());

        let mut first = synchronizer.synchronize_account(account_a.clone()).unwrap();
        let mut joined = synchronizer.synchronize_account(account_a).unwrap();
        assert!(synchronizer.is_synchronizing());

        // A different account is refused while the run is in flight.
        let busy = synchronizer.synchronize_account(account_b).unwrap_err();
        assert!(matches!(busy, SyncError::Busy(id) if id == "acct-a"));

        gate.add_permits(1);
        let report_a = first.wait().await.unwrap();
        let report_joined = joined.wait().await.unwrap();
        assert_eq!(report_a.transactions_seen, report_joined.transactions_seen);
        assert_eq!(report_a.account_id, report_joined.account_id);
    }

    #[tokio::test]
    async fn malformed_record_is_skipped_not_fatal() {
        let explorer = Arc::new(ScriptedExplorer::new(vec![page(
            vec![tx("good-1", 4), tx("bad", 5), tx("good-2", 6)],
            false,
        )]));
        let store: Arc<dyn PreferenceStore> = Arc::new(FilePreferenceStore::in_memory());
        let mut account = MockAccount::new("acct-skip");
        account.fail_hashes.insert("bad".to_string());
        let account = Arc::new(account);
        let synchronizer = AccountSynchronizer::new(
            explorer,
            store.clone(),
            tokio::runtime::Handle::current(),
        );

        let mut notifier = synchronizer.synchronize_account(account.clone()).unwrap();
        let report = notifier.wait().await.unwrap();

        assert_eq!(report.transactions_seen, 2);
        assert_eq!(report.transactions_skipped, 1);
        assert_eq!(*account.committed.lock().unwrap(), vec!["good-1", "good-2"]);
        // The skipped record still counts toward the cursor range.
        let cursors = SyncCursorStore::new(store);
        assert_eq!(cursors.load("acct-skip").unwrap(), Some(6));
    }

    #[tokio::test]
    async fn commit_failure_fails_run_but_keeps_cursor() {
        let explorer = Arc::new(ScriptedExplorer::new(vec![
            page(vec![tx("t10", 10)], true),
            page(vec![tx("t12", 12)], false),
        ]));
        let store: Arc<dyn PreferenceStore> = Arc::new(FilePreferenceStore::in_memory());
        let mut account = MockAccount::new("acct-fail");
        account.fail_commit_on_batch = Some(1);
        let account = Arc::new(account);
        let synchronizer = AccountSynchronizer::new(
            explorer,
            store.clone(),
            tokio::runtime::Handle::current(),
        );

        let mut notifier = synchronizer.synchronize_account(account.clone()).unwrap();
        let err = notifier.wait().await.unwrap_err();
        assert!(matches!(err, SyncError::Database(_)));

        // Only the first batch landed; the cursor points at its ceiling.
        assert_eq!(*account.committed.lock().unwrap(), vec!["t10"]);
        let cursors = SyncCursorStore::new(store);
        assert_eq!(cursors.load("acct-fail").unwrap(), Some(10));
        assert!(!synchronizer.is_synchronizing());
    }

    #[tokio::test]
    async fn next_run_resumes_from_persisted_cursor() {
        let store: Arc<dyn PreferenceStore> = Arc::new(FilePreferenceStore::in_memory());
        SyncCursorStore::new(store.clone())
            .save("acct-resume", 42)
            .unwrap();

        let explorer = Arc::new(ScriptedExplorer::new(vec![page(
            vec![tx("t43", 43)],
            false,
        )]));
        let account = Arc::new(MockAccount::new("acct-resume"));
        let synchronizer = AccountSynchronizer::new(
            explorer.clone(),
            store,
            tokio::runtime::Handle::current(),
        );

        let mut notifier = synchronizer.synchronize_account(account).unwrap();
        notifier.wait().await.unwrap();

        // The run starts from the persisted cursor, not from genesis.
        assert_eq!(explorer.requests(), vec![42]);
    }

    #[tokio::test]
    async fn synchronizer_is_reusable_after_completion() {
        let explorer = Arc::new(ScriptedExplorer::new(vec![
            page(vec![tx("t1", 1)], false),
            page(vec![tx("t2", 2)], false),
        ]));
        let store: Arc<dyn PreferenceStore> = Arc::new(FilePreferenceStore::in_memory());
        let synchronizer = AccountSynchronizer::new(
            explorer.clone(),
            store,
            tokio::runtime::Handle::current(),
        );

        let account = Arc::new(MockAccount::new("acct-again"));
        let mut first = synchronizer.synchronize_account(account.clone()).unwrap();
        first.wait().await.unwrap();

        let mut second = synchronizer.synchronize_account(account).unwrap();
        let report = second.wait().await.unwrap();
        assert_eq!(report.transactions_seen, 1);
        assert_eq!(explorer.requests().len(), 2);
    }

    #[tokio::test]
    async fn explorer_failure_surfaces_through_notifier() {
        // No scripted pages: the first request errors.
        let explorer = Arc::new(ScriptedExplorer::new(vec![]));
        let store: Arc<dyn PreferenceStore> = Arc::new(FilePreferenceStore::in_memory());
        let synchronizer =
            AccountSynchronizer::new(explorer, store, tokio::runtime::Handle::current());

        let account = Arc::new(MockAccount::new("acct-err"));
        let mut notifier = synchronizer.synchronize_account(account).unwrap();
        let err = notifier.wait().await.unwrap_err();
        assert!(matches!(err, SyncError::Explorer(_)));
        assert!(notifier.try_result().is_some());
    }
}
