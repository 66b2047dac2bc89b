//! # lps-event-manager
//!
//! A sync-first facade over the VK long-poll update stream.
//!
//! The async `lps-stream` service runs on a dedicated worker thread with its
//! own tokio runtime. Callers drive it with plain blocking methods and read
//! events through blocking iterators, so no async/await is required.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lps_event_manager::prelude::*;
//!
//! let manager = LongPollManager::new(ApiConfig::new(token))?;
//! manager.start()?;
//!
//! for event in manager.iter() {
//!     match event {
//!         LongPollEvent::MessageChanged => refresh_dialogs(),
//!         LongPollEvent::PresenceChanged { user_ids } => refresh_users(&user_ids),
//!         LongPollEvent::HistoryReset => reload_everything(),
//!     }
//! }
//! ```
//!
//! On logout call [`LongPollManager::set_authorized`] with `false`; the loop
//! terminates and issues no further requests. After the next login, report
//! `true` and call [`LongPollManager::restart`].

pub mod error;
pub mod iter;
pub mod manager;
pub mod worker;

pub use error::{EventManagerError, Result};
pub use iter::LongPollEventIterator;
pub use manager::LongPollManager;

// Re-export commonly used types from the core crate
pub use lps_stream::{
    ApiConfig, Cursor, EventKind, LongPollConfig, LongPollEvent, LoopPhase, TerminationReason,
};

/// Prelude module for convenient imports
///
/// ```rust
/// use lps_event_manager::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        ApiConfig, Cursor, EventManagerError, LongPollConfig, LongPollEvent,
        LongPollEventIterator, LongPollManager, LoopPhase, Result, TerminationReason,
    };
}
