//! Background worker thread for the long-poll service
//!
//! The worker owns a single-threaded tokio runtime and the async
//! `LongPollService`, and forwards events into a std channel for the sync
//! `LongPollManager`.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use lps_stream::{Cursor, EventSubscription, LongPollEvent, LongPollService, TerminationReason};
use tokio::runtime::Runtime;
use tokio::sync::{mpsc as async_mpsc, oneshot};

use crate::error::{EventManagerError, Result};

/// Commands sent from the sync manager to the background worker
#[derive(Debug)]
pub enum Command {
    /// Cold start from the persisted cursor
    Init,
    /// Start a fresh loop, optionally resuming from `seed`
    Restart { seed: Option<Cursor> },
    /// Stop the running loop and report why it ended
    Stop {
        reply: oneshot::Sender<lps_stream::Result<TerminationReason>>,
    },
    /// Stop everything and exit the worker thread
    Shutdown,
}

/// Spawn the worker thread.
///
/// The runtime is built on the calling thread so that a failure surfaces
/// as an error instead of a silently dead worker.
pub fn spawn_worker(
    service: LongPollService,
    command_rx: async_mpsc::UnboundedReceiver<Command>,
    event_tx: mpsc::Sender<LongPollEvent>,
) -> Result<JoinHandle<()>> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(startup_error)?;

    thread::Builder::new()
        .name("lps-worker".to_string())
        .spawn(move || run_on(rt, service, command_rx, event_tx))
        .map_err(startup_error)
}

fn startup_error(e: std::io::Error) -> EventManagerError {
    tracing::error!(error = %e, "failed to start long-poll worker");
    EventManagerError::RuntimeInit(e.to_string())
}

fn run_on(
    rt: Runtime,
    service: LongPollService,
    command_rx: async_mpsc::UnboundedReceiver<Command>,
    event_tx: mpsc::Sender<LongPollEvent>,
) {
    rt.block_on(async move {
        // Subscribe before the first command so no event is missed.
        let events = service.subscribe();
        run_worker(service, events, command_rx, event_tx).await;
    });
}

async fn run_worker(
    mut service: LongPollService,
    mut events: EventSubscription,
    mut command_rx: async_mpsc::UnboundedReceiver<Command>,
    event_tx: mpsc::Sender<LongPollEvent>,
) {
    tracing::info!("long-poll worker started");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    if event_tx.send(event).is_err() {
                        tracing::debug!("event receiver dropped, shutting down worker");
                        break;
                    }
                }
                None => {
                    tracing::info!("event stream ended, shutting down worker");
                    break;
                }
            },

            command = command_rx.recv() => match command {
                Some(Command::Init) => service.init().await,
                Some(Command::Restart { seed }) => {
                    tracing::debug!(seed = ?seed.map(|c| c.value()), "worker restarting poll loop");
                    service.restart(seed).await;
                }
                Some(Command::Stop { reply }) => {
                    // The caller may have given up waiting.
                    let _ = reply.send(service.stop().await);
                }
                Some(Command::Shutdown) | None => {
                    tracing::info!("worker received shutdown");
                    break;
                }
            },
        }
    }

    if service.is_running() {
        if let Err(e) = service.stop().await {
            tracing::warn!(error = %e, "poll loop did not stop cleanly");
        }
    }
    tracing::info!("long-poll worker shut down");
}
