//! Builder for creating and configuring the LongPollService.
//!
//! # Example
//!
//! ```rust,ignore
//! use lps_stream::{ApiConfig, LongPollConfig, LongPollServiceBuilder, VkApiClient};
//! use std::sync::Arc;
//!
//! let service = LongPollServiceBuilder::new()
//!     .with_api_client(Arc::new(VkApiClient::new(ApiConfig::new(token))))
//!     .with_config(LongPollConfig::default())
//!     .with_auth_feed(auth_rx)
//!     .build()?;
//! ```

use std::sync::Arc;
use tokio::sync::watch;

use crate::config::LongPollConfig;
use crate::error::{LongPollError, Result};
use crate::poll_loop::Collaborators;
use crate::service::LongPollService;
use crate::transport::{ApiClient, CursorStore, HttpPollTransport, MemoryCursorStore, PollTransport};

/// Builder for a [`LongPollService`].
///
/// Only the directory API client is required. Defaults for the rest:
/// - Transport: [`HttpPollTransport`]
/// - Cursor store: an empty [`MemoryCursorStore`]
/// - Auth feed: always authorized
/// - Configuration: [`LongPollConfig::default`]
#[derive(Default)]
pub struct LongPollServiceBuilder {
    config: LongPollConfig,
    api: Option<Arc<dyn ApiClient>>,
    transport: Option<Arc<dyn PollTransport>>,
    cursors: Option<Arc<dyn CursorStore>>,
    auth: Option<watch::Receiver<bool>>,
}

impl LongPollServiceBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the loop configuration.
    pub fn with_config(mut self, config: LongPollConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the directory API client used to acquire long-poll servers.
    pub fn with_api_client(mut self, api: Arc<dyn ApiClient>) -> Self {
        self.api = Some(api);
        self
    }

    /// Set the transport used for poll requests.
    pub fn with_transport(mut self, transport: Arc<dyn PollTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the store that persists the last-seen cursor.
    pub fn with_cursor_store(mut self, cursors: Arc<dyn CursorStore>) -> Self {
        self.cursors = Some(cursors);
        self
    }

    /// Set the push feed of the session's authorization.
    ///
    /// The loop terminates as soon as the feed reports `false`.
    pub fn with_auth_feed(mut self, auth: watch::Receiver<bool>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Validate the configuration and build the service.
    ///
    /// # Errors
    ///
    /// Returns `LongPollError::Configuration` if the configuration is invalid
    /// and `LongPollError::MissingComponent` if no API client was set.
    pub fn build(self) -> Result<LongPollService> {
        self.config.validate()?;

        let api = self
            .api
            .ok_or(LongPollError::MissingComponent("directory API client"))?;
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpPollTransport::new()));
        let cursors = self
            .cursors
            .unwrap_or_else(|| Arc::new(MemoryCursorStore::new()));
        // A feed whose sender is gone keeps its last value forever.
        let auth = self.auth.unwrap_or_else(|| watch::channel(true).1);

        Ok(LongPollService::from_parts(
            self.config,
            Collaborators {
                api,
                transport,
                cursors,
                auth,
            },
        ))
    }
}
