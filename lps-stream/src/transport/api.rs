//! reqwest-backed directory API client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::ApiClient;
use crate::error::ApiError;

/// Default endpoint of the method API.
pub const DEFAULT_API_BASE: &str = "https://api.vk.com/method/";

/// Default API version sent with every call.
pub const DEFAULT_API_VERSION: &str = "5.131";

/// API error code for a rejected or expired access token.
const AUTHORIZATION_FAILED: i64 = 5;

/// Connection settings for [`VkApiClient`].
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL that method names are joined onto
    pub base_url: String,
    /// API version (`v`)
    pub version: String,
    /// User access token
    pub access_token: String,
}

impl ApiConfig {
    /// Settings for the public API with the given token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            version: DEFAULT_API_VERSION.to_string(),
            access_token: access_token.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    response: Option<Value>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error_code: i64,
    #[serde(default)]
    error_msg: String,
}

/// Authenticated client for the method API.
#[derive(Debug, Clone)]
pub struct VkApiClient {
    client: Client,
    config: ApiConfig,
}

impl VkApiClient {
    /// Create a client with a default reqwest client.
    pub fn new(config: ApiConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Create a client around an existing reqwest client.
    pub fn with_client(client: Client, config: ApiConfig) -> Self {
        Self { client, config }
    }

    fn method_url(&self, method: &str, params: &[(&str, String)]) -> Result<Url, ApiError> {
        let base = if self.config.base_url.ends_with('/') {
            self.config.base_url.clone()
        } else {
            format!("{}/", self.config.base_url)
        };
        let mut url = Url::parse(&base)
            .and_then(|base| base.join(method))
            .map_err(|e| ApiError::InvalidRequest(format!("{method}: {e}")))?;

        {
            let mut query = url.query_pairs_mut();
            for (name, value) in params {
                query.append_pair(name, value);
            }
            query
                .append_pair("access_token", &self.config.access_token)
                .append_pair("v", &self.config.version);
        }

        Ok(url)
    }
}

#[async_trait]
impl ApiClient for VkApiClient {
    async fn call(&self, method: &str, params: &[(&str, String)]) -> Result<Value, ApiError> {
        let url = self.method_url(method, params)?;
        tracing::debug!(method, "calling API method");

        let body = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let envelope: Envelope =
            serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))?;

        match envelope {
            Envelope {
                error: Some(error), ..
            } if error.error_code == AUTHORIZATION_FAILED => {
                Err(ApiError::Unauthorized(error.error_msg))
            }
            Envelope {
                error: Some(error), ..
            } => Err(ApiError::Api {
                code: error.error_code,
                message: error.error_msg,
            }),
            Envelope {
                response: Some(response),
                ..
            } => Ok(response),
            _ => Err(ApiError::Decode(
                "response has neither `response` nor `error`".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_url() {
        let client = VkApiClient::new(ApiConfig::new("token123"));
        let url = client
            .method_url("messages.getLongPollServer", &[("use_ssl", "1".to_string())])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.vk.com/method/messages.getLongPollServer?use_ssl=1&access_token=token123&v=5.131"
        );
    }

    #[test]
    fn test_method_url_without_trailing_slash() {
        let config = ApiConfig::new("t").with_base_url("http://127.0.0.1:9000/method");
        let client = VkApiClient::new(config);
        let url = client.method_url("users.get", &[]).unwrap();
        assert_eq!(url.path(), "/method/users.get");
    }

    #[test]
    fn test_method_url_invalid_base() {
        let client = VkApiClient::new(ApiConfig::new("t").with_base_url("not a url"));
        assert!(matches!(
            client.method_url("users.get", &[]),
            Err(ApiError::InvalidRequest(_))
        ));
    }
}
