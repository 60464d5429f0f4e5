//! Completion notification for synchronization runs.
//!
//! A run resolves its notifier exactly once; every clone handed out for the
//! same run observes that single resolution. Joining an in-flight run means
//! receiving another clone of the same notifier.

use tokio::sync::watch;

use super::progress::SyncReport;
use super::SyncError;

type Completion = Option<Result<SyncReport, SyncError>>;

/// Create the resolution side and the first notifier clone for one run.
pub(crate) fn completion_channel() -> (watch::Sender<Completion>, SyncNotifier) {
    let (sender, receiver) = watch::channel(None);
    (sender, SyncNotifier { receiver })
}

/// Handle on the outcome of one synchronization run.
#[derive(Clone, Debug)]
pub struct SyncNotifier {
    receiver: watch::Receiver<Completion>,
}

impl SyncNotifier {
    /// Wait for the run to finish and return its outcome.
    pub async fn wait(&mut self) -> Result<SyncReport, SyncError> {
        let outcome = match self.receiver.wait_for(|value| value.is_some()).await {
            Ok(guard) => guard.clone(),
            Err(_) => return Err(SyncError::Aborted),
        };
        outcome.unwrap_or(Err(SyncError::Aborted))
    }

    /// Outcome if the run already finished, without waiting.
    pub fn try_result(&self) -> Option<Result<SyncReport, SyncError>> {
        self.receiver.borrow().clone()
    }
}
