//! Long-poll server acquisition.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::LongPollConfig;
use crate::error::LocatorError;
use crate::transport::ApiClient;
use crate::types::{Cursor, ServerDescriptor};

/// Fetches fresh long-poll server descriptors from the directory API.
///
/// One call per [`acquire`](Self::acquire), bounded by the directory
/// timeout. Retrying is up to the caller.
#[derive(Clone)]
pub struct ServerLocator {
    api: Arc<dyn ApiClient>,
    method: String,
    use_ssl: bool,
    timeout: Duration,
    wait: Duration,
    mode: u32,
}

impl ServerLocator {
    /// Create a locator for the given API client and configuration.
    pub fn new(api: Arc<dyn ApiClient>, config: &LongPollConfig) -> Self {
        Self {
            api,
            method: config.api_method.clone(),
            use_ssl: config.use_ssl,
            timeout: config.directory_timeout,
            wait: config.wait,
            mode: config.mode,
        }
    }

    /// Request a new descriptor.
    ///
    /// # Errors
    ///
    /// Returns `LocatorError::Timeout` if the call outlives the directory
    /// timeout, `LocatorError::Api` if the call fails, and
    /// `LocatorError::IncompleteDescriptor` / `LocatorError::InvalidHost` if
    /// the payload cannot be used to poll.
    pub async fn acquire(&self) -> Result<ServerDescriptor, LocatorError> {
        tracing::debug!(method = %self.method, "requesting long-poll server");

        let use_ssl = if self.use_ssl { "1" } else { "0" };
        let params = [("use_ssl", use_ssl.to_string())];
        let payload = timeout(self.timeout, self.api.call(&self.method, &params))
            .await
            .map_err(|_| LocatorError::Timeout(self.timeout))??;

        let mut server = parse_descriptor(&payload)?;
        server.mode = self.mode;

        server
            .poll_url(self.wait)
            .map_err(|e| LocatorError::InvalidHost(format!("{}: {e}", server.host)))?;

        Ok(server)
    }
}

impl std::fmt::Debug for ServerLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerLocator")
            .field("method", &self.method)
            .field("use_ssl", &self.use_ssl)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Extract `{server, key, ts}` from a directory payload.
///
/// A zero `ts` is treated as missing; the directory never issues it for a
/// live session.
fn parse_descriptor(payload: &Value) -> Result<ServerDescriptor, LocatorError> {
    let host = non_empty_str(payload, "server")?;
    let key = non_empty_str(payload, "key")?;
    let cursor = payload
        .get("ts")
        .and_then(Cursor::from_json)
        .filter(|ts| ts.value() > 0)
        .ok_or_else(|| LocatorError::IncompleteDescriptor("ts".to_string()))?;

    Ok(ServerDescriptor::new(host, key, cursor))
}

fn non_empty_str<'a>(payload: &'a Value, field: &str) -> Result<&'a str, LocatorError> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LocatorError::IncompleteDescriptor(field.to_string()))
}
