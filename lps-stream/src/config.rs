//! Configuration types for the lps-stream crate
//!
//! This module defines the timing and protocol parameters that control the
//! poll loop: request timeouts, the server-side wait, and the fixed restart
//! delay used after a failed server acquisition.

use std::time::Duration;

use crate::types::LONG_POLL_MODE;

/// Configuration for the poll loop
#[derive(Debug, Clone)]
pub struct LongPollConfig {
    /// Timeout for the `getLongPollServer` directory call
    /// Default: 35 seconds
    pub directory_timeout: Duration,

    /// Timeout for a single poll request
    /// Default: 35 seconds
    pub poll_timeout: Duration,

    /// How long the server may hold a poll request open (`wait`)
    /// Default: 25 seconds
    pub wait: Duration,

    /// Feature flags sent with each poll (`mode`)
    /// Default: 2
    pub mode: u32,

    /// Fixed delay before retrying a failed server acquisition
    /// Default: 5 seconds
    pub restart_delay: Duration,

    /// Delay before re-issuing a poll after a transport error
    /// Default: zero (retry immediately)
    pub transport_retry_delay: Duration,

    /// Request an https long-poll endpoint (`use_ssl`)
    /// Default: true
    pub use_ssl: bool,

    /// Directory method that issues long-poll servers
    /// Default: "messages.getLongPollServer"
    pub api_method: String,
}

impl Default for LongPollConfig {
    fn default() -> Self {
        Self {
            directory_timeout: Duration::from_secs(35),
            poll_timeout: Duration::from_secs(35),
            wait: Duration::from_secs(25),
            mode: LONG_POLL_MODE,
            restart_delay: Duration::from_secs(5),
            transport_retry_delay: Duration::ZERO,
            use_ssl: true,
            api_method: "messages.getLongPollServer".to_string(),
        }
    }
}

impl LongPollConfig {
    /// Create a new LongPollConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a LongPollConfig that recovers quickly, for development
    pub fn fast_restart() -> Self {
        Self {
            restart_delay: Duration::from_secs(1),
            directory_timeout: Duration::from_secs(10),
            ..Default::default()
        }
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<(), crate::LongPollError> {
        if self.directory_timeout.is_zero() {
            return Err(crate::LongPollError::Configuration(
                "Directory timeout must be greater than 0".to_string(),
            ));
        }

        if self.wait.is_zero() {
            return Err(crate::LongPollError::Configuration(
                "Server wait must be greater than 0".to_string(),
            ));
        }

        if self.poll_timeout <= self.wait {
            return Err(crate::LongPollError::Configuration(
                "Invalid poll timeout: must exceed the server wait".to_string(),
            ));
        }

        if self.api_method.trim().is_empty() {
            return Err(crate::LongPollError::Configuration(
                "API method must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_timeouts(mut self, directory: Duration, poll: Duration) -> Self {
        self.directory_timeout = directory;
        self.poll_timeout = poll;
        self
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    pub fn with_transport_retry_delay(mut self, delay: Duration) -> Self {
        self.transport_retry_delay = delay;
        self
    }

    pub fn with_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }
}
