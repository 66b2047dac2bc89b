//! Collaborator seams of the poll loop.
//!
//! The loop never talks to the network or to storage directly. It goes
//! through these traits so that the HTTP stack, the session store and the
//! cursor persistence can be swapped or faked.

mod api;
mod http;

pub use api::{ApiConfig, VkApiClient, DEFAULT_API_BASE, DEFAULT_API_VERSION};
pub use http::HttpPollTransport;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{ApiError, TransportError};
use crate::types::Cursor;

/// Issues a single long-poll request.
///
/// # Cancellation
///
/// Implementations must observe `cancel` and return
/// `TransportError::Cancelled` promptly once it fires, instead of waiting for
/// the server to answer.
#[async_trait]
pub trait PollTransport: Send + Sync {
    /// GET `url` and return the parsed JSON body.
    async fn poll(&self, url: &Url, cancel: &CancellationToken) -> Result<Value, TransportError>;
}

/// Performs authenticated calls against the directory API.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Call `method` with `params` and return the unwrapped `response` payload.
    async fn call(&self, method: &str, params: &[(&str, String)]) -> Result<Value, ApiError>;
}

/// Source and sink of the last-seen cursor across restarts.
pub trait CursorStore: Send + Sync {
    /// The last persisted cursor, if any. Read once at cold start.
    fn load(&self) -> Option<Cursor>;

    /// Record the cursor after a successful poll.
    fn store(&self, cursor: Cursor);
}

/// In-memory cursor store.
#[derive(Debug, Clone, Default)]
pub struct MemoryCursorStore {
    cursor: Arc<Mutex<Option<Cursor>>>,
}

impl MemoryCursorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `cursor`.
    pub fn with_cursor(cursor: Cursor) -> Self {
        Self {
            cursor: Arc::new(Mutex::new(Some(cursor))),
        }
    }
}

impl CursorStore for MemoryCursorStore {
    fn load(&self) -> Option<Cursor> {
        self.cursor.lock().ok().and_then(|c| *c)
    }

    fn store(&self, cursor: Cursor) {
        if let Ok(mut current) = self.cursor.lock() {
            *current = Some(cursor);
        }
    }
}
