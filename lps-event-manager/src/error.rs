use thiserror::Error;

/// Errors that can occur in the long-poll event manager
#[derive(Error, Debug)]
pub enum EventManagerError {
    /// Error reported by the long-poll service
    #[error("Long-poll service error: {0}")]
    Service(#[from] lps_stream::LongPollError),

    /// The background worker is gone and no longer accepts commands
    #[error("Background worker is not running")]
    WorkerDisconnected,

    /// The worker runtime or thread could not be started
    #[error("Failed to start background worker: {0}")]
    RuntimeInit(String),

    /// The worker thread panicked
    #[error("Background worker panicked")]
    WorkerPanicked,

    /// The worker dropped a reply channel before answering
    #[error("Reply channel has been closed")]
    ChannelClosed,
}

/// Result type for event manager operations
pub type Result<T> = std::result::Result<T, EventManagerError>;
