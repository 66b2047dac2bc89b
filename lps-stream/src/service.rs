//! Owner of the poll loop and its event sink.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::builder::LongPollServiceBuilder;
use crate::config::LongPollConfig;
use crate::error::{LongPollError, Result};
use crate::event::EventKind;
use crate::poll_loop::{Collaborators, LoopPhase, PollLoop};
use crate::sink::{EventSink, EventSubscription};
use crate::types::{Cursor, TerminationReason};

/// How long [`LongPollService::stop`] waits for the loop task.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

struct RunningLoop {
    stop: CancellationToken,
    task: JoinHandle<TerminationReason>,
}

/// Long-poll monitoring for one authenticated session.
///
/// The service keeps one event sink for its whole lifetime; subscriptions
/// survive restarts of the underlying loop. At most one loop runs at a time.
///
/// # Example
///
/// ```rust,ignore
/// use lps_stream::{ApiConfig, LongPollService, VkApiClient};
/// use std::sync::Arc;
///
/// let mut service = LongPollService::builder()
///     .with_api_client(Arc::new(VkApiClient::new(ApiConfig::new(token))))
///     .with_auth_feed(auth_rx)
///     .build()?;
///
/// let mut events = service.subscribe();
/// service.init().await;
///
/// while let Some(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// ```
pub struct LongPollService {
    config: LongPollConfig,
    collaborators: Collaborators,
    sink: EventSink,
    phase: watch::Sender<LoopPhase>,
    running: Option<RunningLoop>,
}

impl LongPollService {
    /// Start building a service.
    pub fn builder() -> LongPollServiceBuilder {
        LongPollServiceBuilder::new()
    }

    pub(crate) fn from_parts(config: LongPollConfig, collaborators: Collaborators) -> Self {
        let (phase, _) = watch::channel(LoopPhase::Idle);
        Self {
            config,
            collaborators,
            sink: EventSink::new(),
            phase,
            running: None,
        }
    }

    /// Subscribe to every event.
    pub fn subscribe(&self) -> EventSubscription {
        self.sink.subscribe()
    }

    /// Subscribe to the given event kinds.
    pub fn subscribe_to(&self, kinds: &[EventKind]) -> EventSubscription {
        self.sink.subscribe_to(kinds)
    }

    /// The event sink shared by every loop this service runs.
    pub fn events(&self) -> &EventSink {
        &self.sink
    }

    /// Current phase of the loop.
    pub fn phase(&self) -> LoopPhase {
        *self.phase.borrow()
    }

    /// Watch phase changes of the loop.
    pub fn watch_phase(&self) -> watch::Receiver<LoopPhase> {
        self.phase.subscribe()
    }

    /// The active configuration.
    pub fn config(&self) -> &LongPollConfig {
        &self.config
    }

    /// Whether a loop is currently running.
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }

    /// Cold start: resume from the persisted cursor, if there is one.
    ///
    /// The cursor store is read exactly once here. A zero cursor counts as
    /// absent.
    pub async fn init(&mut self) {
        let seed = self
            .collaborators
            .cursors
            .load()
            .filter(|cursor| cursor.value() > 0);
        tracing::info!(seed = ?seed.map(|c| c.value()), "initializing long-poll service");
        self.restart(seed).await;
    }

    /// Start a fresh loop, stopping the current one first.
    ///
    /// This is the entry point after a terminated loop, e.g. after a new
    /// login.
    pub async fn restart(&mut self, seed: Option<Cursor>) {
        if self.running.is_some() {
            if let Err(e) = self.stop().await {
                tracing::warn!(error = %e, "previous poll loop did not stop cleanly");
            }
        }

        let stop = CancellationToken::new();
        let poll_loop = PollLoop::new(
            self.config.clone(),
            self.collaborators.clone(),
            self.sink.clone(),
            stop.clone(),
        )
        .with_phase_reporting(self.phase.clone());

        let task = tokio::spawn(poll_loop.run(seed));
        self.running = Some(RunningLoop { stop, task });
    }

    /// Stop the running loop and wait for it to finish.
    ///
    /// # Errors
    ///
    /// Returns `LongPollError::NotRunning` if no loop was started, and
    /// `LongPollError::Shutdown` if the loop task panicked or did not finish
    /// within 5 seconds.
    pub async fn stop(&mut self) -> Result<TerminationReason> {
        let running = self.running.take().ok_or(LongPollError::NotRunning)?;
        running.stop.cancel();

        match timeout(SHUTDOWN_TIMEOUT, running.task).await {
            Ok(Ok(reason)) => Ok(reason),
            Ok(Err(e)) => Err(LongPollError::Shutdown(format!("poll loop panicked: {e}"))),
            Err(_) => Err(LongPollError::Shutdown(
                "poll loop shutdown timed out after 5 seconds".to_string(),
            )),
        }
    }

    /// Wait until the running loop terminates on its own.
    ///
    /// # Errors
    ///
    /// Returns `LongPollError::NotRunning` if no loop was started, and
    /// `LongPollError::Shutdown` if the loop task panicked.
    pub async fn wait(&mut self) -> Result<TerminationReason> {
        let running = self.running.take().ok_or(LongPollError::NotRunning)?;
        running
            .task
            .await
            .map_err(|e| LongPollError::Shutdown(format!("poll loop panicked: {e}")))
    }
}

impl Drop for LongPollService {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.stop.cancel();
        }
    }
}

impl std::fmt::Debug for LongPollService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LongPollService")
            .field("config", &self.config)
            .field("phase", &self.phase())
            .field("running", &self.is_running())
            .field("sink", &self.sink)
            .finish()
    }
}
