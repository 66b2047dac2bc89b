//! # lps-stream
//!
//! A self-healing subscription to the VK messages long-poll update stream.
//!
//! The driver acquires a long-poll server from the directory API, keeps one
//! poll request in flight at a time, and turns raw update records into three
//! coalesced events: messages changed, presence changed, history reset. Key
//! expiry, history invalidation and transient network failures are recovered
//! internally; only loss of authorization stops the loop.
//!
//! HTTP, the session store and cursor persistence sit behind the traits in
//! [`transport`], with reqwest-backed defaults.

mod builder;
mod classifier;
mod config;
mod decoder;
mod error;
mod event;
mod locator;
pub mod logging;
mod poll_loop;
mod scheduler;
mod service;
mod sink;
pub mod transport;
mod types;

pub use builder::LongPollServiceBuilder;
pub use classifier::{classify, classify_outcome, FailureCode, PollResponse};
pub use config::LongPollConfig;
pub use decoder::{classify_update, decode, DecodedBatch, UpdateKind};
pub use error::*;
pub use event::{EventKind, LongPollEvent};
pub use locator::ServerLocator;
pub use poll_loop::{Collaborators, LoopPhase, LoopState, PollLoop};
pub use scheduler::{RestartHandle, RestartRequest, RetryScheduler};
pub use service::LongPollService;
pub use sink::{EventSink, EventSubscription, SubscriberId};
pub use transport::{
    ApiClient, ApiConfig, CursorStore, HttpPollTransport, MemoryCursorStore, PollTransport,
    VkApiClient,
};
pub use types::*;

// Re-exported so implementors of `PollTransport` need no direct dependency.
pub use tokio_util::sync::CancellationToken;
