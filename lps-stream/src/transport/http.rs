//! reqwest-backed poll transport.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::PollTransport;
use crate::error::TransportError;

/// Poll transport that issues plain GET requests.
///
/// The client carries no timeout of its own; the poll loop bounds every
/// request with the configured poll timeout.
#[derive(Debug, Clone, Default)]
pub struct HttpPollTransport {
    client: Client,
}

impl HttpPollTransport {
    /// Create a transport with a default reqwest client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport around an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, url: &Url) -> Result<Value, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(TransportError::Unauthorized(format!(
                "long-poll server answered {status}"
            )));
        }
        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(network_error)?;
        serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PollTransport for HttpPollTransport {
    async fn poll(&self, url: &Url, cancel: &CancellationToken) -> Result<Value, TransportError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = self.fetch(url) => result,
        }
    }
}

fn network_error(e: reqwest::Error) -> TransportError {
    TransportError::Network(e.to_string())
}
