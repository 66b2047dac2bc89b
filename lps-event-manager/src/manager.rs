//! Sync-first long-poll manager
//!
//! Provides a fully synchronous API over the long-poll service. All async
//! work happens on a background worker thread.

use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;

use lps_stream::{
    ApiConfig, Cursor, CursorStore, LongPollConfig, LongPollEvent, LongPollService,
    LongPollServiceBuilder, LoopPhase, TerminationReason, VkApiClient,
};
use tokio::sync::{mpsc as async_mpsc, oneshot, watch};

use crate::error::{EventManagerError, Result};
use crate::iter::LongPollEventIterator;
use crate::worker::{spawn_worker, Command};

/// Sync-first manager for one session's long-poll stream
///
/// Every method blocks the calling thread and must not be called from
/// inside an async runtime.
///
/// # Example
///
/// ```rust,ignore
/// use lps_event_manager::{ApiConfig, LongPollManager};
///
/// let manager = LongPollManager::new(ApiConfig::new(token))?;
/// manager.start()?;
///
/// for event in manager.iter() {
///     println!("{event:?}");
/// }
/// ```
pub struct LongPollManager {
    command_tx: async_mpsc::UnboundedSender<Command>,
    event_rx: Arc<Mutex<mpsc::Receiver<LongPollEvent>>>,
    auth: watch::Sender<bool>,
    phase: watch::Receiver<LoopPhase>,
    worker: Option<JoinHandle<()>>,
}

impl LongPollManager {
    /// Create a manager talking to the public API with default settings.
    pub fn new(api: ApiConfig) -> Result<Self> {
        Self::with_config(api, LongPollConfig::default())
    }

    /// Create a manager with a custom loop configuration.
    pub fn with_config(api: ApiConfig, config: LongPollConfig) -> Result<Self> {
        Self::with_builder(
            LongPollService::builder()
                .with_api_client(Arc::new(VkApiClient::new(api)))
                .with_config(config),
        )
    }

    /// Create a manager that persists cursors in `cursors`.
    pub fn with_cursor_store(
        api: ApiConfig,
        config: LongPollConfig,
        cursors: Arc<dyn CursorStore>,
    ) -> Result<Self> {
        Self::with_builder(
            LongPollService::builder()
                .with_api_client(Arc::new(VkApiClient::new(api)))
                .with_config(config)
                .with_cursor_store(cursors),
        )
    }

    /// Create a manager from a prepared service builder.
    ///
    /// The manager owns the authorization feed, so any feed set on
    /// `builder` is replaced. The session starts out authorized.
    pub fn with_builder(builder: LongPollServiceBuilder) -> Result<Self> {
        let (auth, auth_rx) = watch::channel(true);
        let service = builder.with_auth_feed(auth_rx).build()?;
        let phase = service.watch_phase();

        let (command_tx, command_rx) = async_mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel();
        let worker = spawn_worker(service, command_rx, event_tx)?;

        Ok(Self {
            command_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
            auth,
            phase,
            worker: Some(worker),
        })
    }

    /// Cold start from the persisted cursor.
    pub fn start(&self) -> Result<()> {
        self.send(Command::Init)
    }

    /// Start a fresh loop, stopping the current one first.
    ///
    /// Call this after a new login; a loop that terminated on lost
    /// authorization does not come back by itself.
    pub fn restart(&self, seed: Option<Cursor>) -> Result<()> {
        self.send(Command::Restart { seed })
    }

    /// Stop the running loop and wait for it to finish.
    pub fn stop(&self) -> Result<TerminationReason> {
        let (reply, reply_rx) = oneshot::channel();
        self.send(Command::Stop { reply })?;
        let reason = reply_rx
            .blocking_recv()
            .map_err(|_| EventManagerError::ChannelClosed)??;
        Ok(reason)
    }

    /// Report the session's authorization.
    ///
    /// Flipping to `false` terminates the running loop, abandoning any
    /// outstanding poll.
    pub fn set_authorized(&self, authorized: bool) {
        tracing::debug!(authorized, "authorization changed");
        self.auth.send_replace(authorized);
    }

    /// Last reported authorization.
    pub fn is_authorized(&self) -> bool {
        *self.auth.borrow()
    }

    /// Current phase of the poll loop.
    pub fn phase(&self) -> LoopPhase {
        *self.phase.borrow()
    }

    /// Watch phase changes of the poll loop.
    pub fn watch_phase(&self) -> watch::Receiver<LoopPhase> {
        self.phase.clone()
    }

    /// Get a blocking iterator over events.
    ///
    /// ```rust,ignore
    /// // Blocking iteration
    /// for event in manager.iter() {
    ///     println!("Event: {:?}", event);
    /// }
    ///
    /// // Drain without blocking
    /// for event in manager.iter().try_iter() {
    ///     println!("Queued: {:?}", event);
    /// }
    /// ```
    pub fn iter(&self) -> LongPollEventIterator {
        LongPollEventIterator::new(Arc::clone(&self.event_rx))
    }

    /// Stop the loop and join the worker thread.
    pub fn shutdown(mut self) -> Result<()> {
        self.shutdown_worker()
    }

    fn shutdown_worker(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        // The worker may already have exited on its own.
        let _ = self.command_tx.send(Command::Shutdown);
        worker
            .join()
            .map_err(|_| EventManagerError::WorkerPanicked)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_| EventManagerError::WorkerDisconnected)
    }
}

impl Drop for LongPollManager {
    fn drop(&mut self) {
        if self.worker.is_some() {
            tracing::debug!("LongPollManager dropping, shutting down worker");
            let _ = self.command_tx.send(Command::Shutdown);
        }
    }
}

impl std::fmt::Debug for LongPollManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LongPollManager")
            .field("phase", &self.phase())
            .field("authorized", &self.is_authorized())
            .field("worker_alive", &self.worker.is_some())
            .finish()
    }
}
