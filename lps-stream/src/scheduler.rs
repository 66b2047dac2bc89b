//! Delayed restart scheduling.
//!
//! A failed server acquisition is retried after a fixed delay. The restart is
//! delivered to the poll loop over a channel so that the loop stays the only
//! owner of its state, and the pending timer can be cancelled when the loop
//! is stopped first.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::types::Cursor;

/// Request to re-enter server acquisition.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RestartRequest {
    /// Cursor to resume from, if any
    pub seed: Option<Cursor>,
}

/// Schedules one-shot restarts of server acquisition.
#[derive(Debug, Clone)]
pub struct RetryScheduler {
    restart_tx: mpsc::UnboundedSender<RestartRequest>,
}

impl RetryScheduler {
    /// Create a scheduler and the receiving end of its restart requests.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RestartRequest>) {
        let (restart_tx, restart_rx) = mpsc::unbounded_channel();
        (Self { restart_tx }, restart_rx)
    }

    /// Deliver a restart request carrying `seed` once `delay` has elapsed.
    ///
    /// The request fires exactly once unless the returned handle is
    /// cancelled or dropped first.
    pub fn schedule_restart(&self, delay: Duration, seed: Option<Cursor>) -> RestartHandle {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let restart_tx = self.restart_tx.clone();

        let task = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = task_token.cancelled() => {
                    tracing::debug!("scheduled restart cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    if restart_tx.send(RestartRequest { seed }).is_err() {
                        tracing::debug!("poll loop gone before scheduled restart fired");
                    }
                }
            }
        });

        RestartHandle { token, task }
    }
}

/// Handle to a pending restart.
///
/// Dropping the handle cancels the restart if it has not fired yet.
#[derive(Debug)]
pub struct RestartHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl RestartHandle {
    /// Cancel the pending restart.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the restart has fired or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for RestartHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
