//! The long-poll state machine.
//!
//! ```text
//!            start / restart(seed)
//!                    │
//!                    ▼
//!   Idle ──────► Acquiring ───────► Polling ◄──┐ success / transport error
//!    ▲               │  ▲             │  │     │
//!    │  acquisition  │  │ failed=1,2,3│  └─────┘
//!    └───────────────┘  └─────────────┘
//!       (5 s restart)                 │ unauthorized
//!                                     ▼
//!                                 Terminated
//! ```
//!
//! Each iteration of [`PollLoop::run`] performs exactly one transition, so
//! the stack depth stays constant no matter how many polls are issued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::classifier::{classify_outcome, PollResponse};
use crate::config::LongPollConfig;
use crate::decoder::decode;
use crate::error::TransportError;
use crate::event::LongPollEvent;
use crate::locator::ServerLocator;
use crate::scheduler::{RestartHandle, RestartRequest, RetryScheduler};
use crate::sink::EventSink;
use crate::transport::{ApiClient, CursorStore, PollTransport};
use crate::types::{Cursor, ServerDescriptor, TerminationReason, UpdateRecord};

/// External collaborators of a poll loop.
#[derive(Clone)]
pub struct Collaborators {
    /// Directory API used to acquire long-poll servers
    pub api: Arc<dyn ApiClient>,
    /// Transport that issues poll requests
    pub transport: Arc<dyn PollTransport>,
    /// Persisted cursor
    pub cursors: Arc<dyn CursorStore>,
    /// Push feed of the session's authorization
    pub auth: watch::Receiver<bool>,
}

/// Externally visible phase of a poll loop.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LoopPhase {
    /// Waiting for a scheduled restart
    Idle,
    /// Requesting a long-poll server
    Acquiring,
    /// Issuing poll requests
    Polling,
    /// Stopped for good
    Terminated,
}

/// State of a poll loop, carrying the data each phase owns.
#[derive(Debug)]
pub enum LoopState {
    /// A restart is pending
    Idle(RestartHandle),
    /// Acquiring a server, optionally resuming from `seed`
    Acquiring { seed: Option<Cursor> },
    /// Polling the given server
    Polling(ServerDescriptor),
    /// Stopped for good
    Terminated(TerminationReason),
}

impl LoopState {
    /// The phase of this state.
    pub fn phase(&self) -> LoopPhase {
        match self {
            Self::Idle(_) => LoopPhase::Idle,
            Self::Acquiring { .. } => LoopPhase::Acquiring,
            Self::Polling(_) => LoopPhase::Polling,
            Self::Terminated(_) => LoopPhase::Terminated,
        }
    }
}

/// One long-poll session.
///
/// The loop owns its server descriptor and is the only task that touches
/// it. Polls never overlap: the next request is issued only after the
/// previous one completed, timed out or was abandoned.
pub struct PollLoop {
    config: LongPollConfig,
    locator: ServerLocator,
    transport: Arc<dyn PollTransport>,
    cursors: Arc<dyn CursorStore>,
    auth: watch::Receiver<bool>,
    auth_lost: Arc<AtomicBool>,
    sink: EventSink,
    stop: CancellationToken,
    scheduler: RetryScheduler,
    restarts: mpsc::UnboundedReceiver<RestartRequest>,
    phase: Option<watch::Sender<LoopPhase>>,
}

impl PollLoop {
    /// Create a loop that stops when `stop` is cancelled.
    pub fn new(
        config: LongPollConfig,
        collaborators: Collaborators,
        sink: EventSink,
        stop: CancellationToken,
    ) -> Self {
        let (scheduler, restarts) = RetryScheduler::new();
        Self {
            locator: ServerLocator::new(collaborators.api, &config),
            transport: collaborators.transport,
            cursors: collaborators.cursors,
            auth: collaborators.auth,
            auth_lost: Arc::new(AtomicBool::new(false)),
            config,
            sink,
            stop,
            scheduler,
            restarts,
            phase: None,
        }
    }

    /// Publish every phase change on `phase`.
    pub fn with_phase_reporting(mut self, phase: watch::Sender<LoopPhase>) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Run the loop until it terminates.
    ///
    /// A `seed` cursor overrides the cursor of the first acquired server.
    pub async fn run(mut self, seed: Option<Cursor>) -> TerminationReason {
        info!(seed = ?seed.map(|c| c.value()), "starting long-poll monitoring");
        let watcher = self.watch_authorization();

        let mut state = LoopState::Acquiring { seed };
        loop {
            self.report(state.phase());
            state = match state {
                LoopState::Idle(pending) => self.wait_for_restart(pending).await,
                LoopState::Acquiring { seed } => self.acquire(seed).await,
                LoopState::Polling(server) => self.poll(server).await,
                LoopState::Terminated(reason) => {
                    watcher.abort();
                    info!(%reason, "long-poll monitoring stopped");
                    return reason;
                }
            };
        }
    }

    /// Cancel the loop's token as soon as the session loses authorization.
    ///
    /// The feed only carries the latest value, so a `false` that is replaced
    /// by `true` before the watcher runs is never seen. Once seen, the loss
    /// is recorded and the loop reports `Unauthorized` even if the session
    /// logs back in before it winds down.
    fn watch_authorization(&self) -> JoinHandle<()> {
        let mut auth = self.auth.clone();
        let stop = self.stop.clone();
        let auth_lost = Arc::clone(&self.auth_lost);

        tokio::spawn(async move {
            let lost = tokio::select! {
                _ = stop.cancelled() => false,
                lost = async { auth.wait_for(|authorized| !*authorized).await.is_ok() } => lost,
            };
            if lost {
                info!("session is no longer authorized, cancelling long poll");
                auth_lost.store(true, Ordering::SeqCst);
                stop.cancel();
            }
        })
    }

    async fn wait_for_restart(&mut self, pending: RestartHandle) -> LoopState {
        tokio::select! {
            biased;
            _ = self.stop.cancelled() => {
                pending.cancel();
                LoopState::Terminated(self.termination_reason())
            }
            request = self.restarts.recv() => match request {
                Some(RestartRequest { seed }) => {
                    debug!("scheduled restart fired");
                    LoopState::Acquiring { seed }
                }
                None => LoopState::Terminated(TerminationReason::Stopped),
            },
        }
    }

    async fn acquire(&self, seed: Option<Cursor>) -> LoopState {
        let result = tokio::select! {
            biased;
            _ = self.stop.cancelled() => return LoopState::Terminated(self.termination_reason()),
            result = self.locator.acquire() => result,
        };

        match result {
            Ok(mut server) => {
                info!(host = %server.host, cursor = %server.cursor, "got long-poll server");
                if let Some(seed) = seed {
                    debug!(cursor = %seed, "resuming from previous cursor");
                    server.cursor = seed;
                }
                LoopState::Polling(server)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    delay = ?self.config.restart_delay,
                    "unable to get long-poll server, scheduling restart"
                );
                self.schedule_restart()
            }
        }
    }

    async fn poll(&self, mut server: ServerDescriptor) -> LoopState {
        if self.stop.is_cancelled() || !*self.auth.borrow() {
            return LoopState::Terminated(self.termination_reason());
        }

        let url = match server.poll_url(self.config.wait) {
            Ok(url) => url,
            Err(e) => {
                warn!(host = %server.host, error = %e, "unusable long-poll server, scheduling restart");
                return self.schedule_restart();
            }
        };

        debug!(host = %server.host, cursor = %server.cursor, "performing long-poll request");
        let poll_timeout = self.config.poll_timeout;
        let outcome = tokio::select! {
            biased;
            _ = self.stop.cancelled() => return LoopState::Terminated(self.termination_reason()),
            result = timeout(poll_timeout, self.transport.poll(&url, &self.stop)) => {
                result.unwrap_or(Err(TransportError::Timeout(poll_timeout)))
            }
        };

        match classify_outcome(outcome) {
            PollResponse::Success { cursor, updates } => {
                debug!(cursor = %cursor, updates = updates.len(), "got long-poll response");
                server.cursor = cursor;
                self.cursors.store(cursor);
                self.publish(&updates);
                LoopState::Polling(server)
            }
            PollResponse::Failed(code) if code.preserves_cursor() => {
                info!(
                    failed = code.code(),
                    cursor = %server.cursor,
                    "long-poll key is stale, requesting a new one"
                );
                LoopState::Acquiring {
                    seed: Some(server.cursor),
                }
            }
            PollResponse::Failed(code) => {
                info!(failed = code.code(), "long-poll history became obsolete, resetting");
                self.sink.emit(LongPollEvent::HistoryReset);
                LoopState::Acquiring { seed: None }
            }
            PollResponse::TransportError(reason) => {
                warn!(%reason, cursor = %server.cursor, "long-poll request failed, retrying");
                let delay = self.config.transport_retry_delay;
                if !delay.is_zero() {
                    tokio::select! {
                        biased;
                        _ = self.stop.cancelled() => {
                            return LoopState::Terminated(self.termination_reason());
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                } else {
                    // A transport that fails without suspending would
                    // otherwise hold a current-thread runtime.
                    tokio::task::yield_now().await;
                }
                LoopState::Polling(server)
            }
            PollResponse::AuthError => {
                warn!("long-poll request unauthorized");
                LoopState::Terminated(TerminationReason::Unauthorized)
            }
        }
    }

    /// Decode a batch and emit its coalesced events.
    fn publish(&self, updates: &[UpdateRecord]) {
        let batch = decode(updates);

        for record in &batch.unrecognized {
            warn!(opcode = ?record.opcode(), %record, "unknown update in long-poll response");
        }
        if !batch.affected_user_ids.is_empty() {
            debug!(users = ?batch.affected_user_ids, "presence changed");
        }

        for event in batch.events() {
            self.sink.emit(event);
        }
    }

    fn schedule_restart(&self) -> LoopState {
        LoopState::Idle(
            self.scheduler
                .schedule_restart(self.config.restart_delay, None),
        )
    }

    fn termination_reason(&self) -> TerminationReason {
        if !self.auth_lost.load(Ordering::SeqCst) && *self.auth.borrow() {
            TerminationReason::Stopped
        } else {
            TerminationReason::Unauthorized
        }
    }

    fn report(&self, phase: LoopPhase) {
        if let Some(tx) = &self.phase {
            tx.send_replace(phase);
        }
    }
}

impl std::fmt::Debug for PollLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollLoop")
            .field("config", &self.config)
            .field("locator", &self.locator)
            .field("stopped", &self.stop.is_cancelled())
            .finish()
    }
}
