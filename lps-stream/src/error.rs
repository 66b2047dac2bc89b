//! Error types for the lps-stream crate.

use std::time::Duration;

/// Errors from a single long-poll request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The request did not complete within the poll timeout
    #[error("Poll request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-success status
    #[error("HTTP error: status {status}")]
    Http {
        /// The HTTP status code
        status: u16,
    },

    /// The response body was not valid JSON
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The request was abandoned because its cancellation token fired
    #[error("Request cancelled")]
    Cancelled,

    /// The session is no longer authorized
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

/// Errors from the directory API call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// The response body could not be decoded
    #[error("Failed to decode API response: {0}")]
    Decode(String),

    /// The API returned an error object
    #[error("API error {code}: {message}")]
    Api {
        /// The API error code
        code: i64,
        /// The API error message
        message: String,
    },

    /// The access token was rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Errors from long-poll server acquisition.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LocatorError {
    /// The directory call did not complete in time
    #[error("Long-poll server request timed out after {0:?}")]
    Timeout(Duration),

    /// The directory call failed
    #[error("Directory call failed: {0}")]
    Api(#[from] ApiError),

    /// The descriptor is missing a required field
    #[error("Incomplete long-poll server descriptor: missing {0}")]
    IncompleteDescriptor(String),

    /// The descriptor host cannot form a poll URL
    #[error("Invalid long-poll server host: {0}")]
    InvalidHost(String),
}

/// Errors from the long-poll service.
#[derive(Debug, thiserror::Error)]
pub enum LongPollError {
    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The builder was missing a required collaborator
    #[error("Missing component: {0}")]
    MissingComponent(&'static str),

    /// The operation needs a running poll loop
    #[error("Poll loop is not running")]
    NotRunning,

    /// An error occurred during shutdown
    #[error("Shutdown error: {0}")]
    Shutdown(String),
}

/// Convenience type alias for Results using LongPollError.
pub type Result<T> = std::result::Result<T, LongPollError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let error = TransportError::Timeout(Duration::from_secs(35));
        assert_eq!(error.to_string(), "Poll request timed out after 35s");

        let error = TransportError::Http { status: 502 };
        assert_eq!(error.to_string(), "HTTP error: status 502");

        let error = TransportError::Cancelled;
        assert_eq!(error.to_string(), "Request cancelled");
    }

    #[test]
    fn test_api_error_display() {
        let error = ApiError::Api {
            code: 10,
            message: "Internal server error".to_string(),
        };
        assert_eq!(error.to_string(), "API error 10: Internal server error");

        let error = ApiError::Unauthorized("invalid access_token".to_string());
        assert_eq!(error.to_string(), "Unauthorized: invalid access_token");
    }

    #[test]
    fn test_locator_error_from_api_error() {
        let error: LocatorError = ApiError::Network("connection refused".to_string()).into();
        match error {
            LocatorError::Api(ApiError::Network(msg)) => assert_eq!(msg, "connection refused"),
            other => panic!("Expected Api variant, got {other:?}"),
        }

        let error = LocatorError::IncompleteDescriptor("ts".to_string());
        assert_eq!(
            error.to_string(),
            "Incomplete long-poll server descriptor: missing ts"
        );
    }

    #[test]
    fn test_long_poll_error_display() {
        let error = LongPollError::Configuration("wait must be positive".to_string());
        assert_eq!(error.to_string(), "Configuration error: wait must be positive");

        let error = LongPollError::MissingComponent("poll transport");
        assert_eq!(error.to_string(), "Missing component: poll transport");

        assert_eq!(LongPollError::NotRunning.to_string(), "Poll loop is not running");
    }
}
