//! Interpretation of poll responses.
//!
//! Fields are inspected in a fixed priority order: `failed`, then `error`,
//! then the success fields `ts` and `updates`. Anything else is treated as a
//! transport error so that a malformed success is retried rather than
//! silently dropped.

use serde_json::Value;

use crate::error::TransportError;
use crate::types::{Cursor, UpdateRecord};

/// Server-reported failure codes of a poll response.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FailureCode {
    /// `failed=1`: the cursor is too old to resume from
    HistoryObsolete,
    /// `failed=2`: the access key expired
    KeyExpired,
    /// `failed=3`: the server lost the session and needs a new key
    KeyLost,
}

impl FailureCode {
    /// Map the numeric `failed` value.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::HistoryObsolete),
            2 => Some(Self::KeyExpired),
            3 => Some(Self::KeyLost),
            _ => None,
        }
    }

    /// The numeric `failed` value.
    pub fn code(&self) -> i64 {
        match self {
            Self::HistoryObsolete => 1,
            Self::KeyExpired => 2,
            Self::KeyLost => 3,
        }
    }

    /// Whether the current cursor is still meaningful after recovery.
    ///
    /// Only the key is stale for codes 2 and 3. Code 1 invalidates the
    /// backlog, so resuming from the old cursor would miss or repeat updates.
    pub fn preserves_cursor(&self) -> bool {
        !matches!(self, Self::HistoryObsolete)
    }
}

/// Classified poll response.
#[derive(Debug, Clone, PartialEq)]
pub enum PollResponse {
    /// Updates were delivered; `cursor` is the position of the next poll
    Success {
        cursor: Cursor,
        updates: Vec<UpdateRecord>,
    },
    /// The server reported a recoverable failure
    Failed(FailureCode),
    /// The request failed or the response could not be understood
    TransportError(String),
    /// The session is no longer authorized
    AuthError,
}

/// Classify a decoded poll response body.
pub fn classify(body: &Value) -> PollResponse {
    let Some(object) = body.as_object() else {
        return PollResponse::TransportError(format!("unexpected response shape: {body}"));
    };

    if let Some(failed) = object.get("failed") {
        return match failed.as_i64().and_then(FailureCode::from_code) {
            Some(code) => PollResponse::Failed(code),
            None => PollResponse::TransportError(format!("unknown failure code: {failed}")),
        };
    }

    if let Some(error) = object.get("error") {
        return if is_unauthorized(error) {
            PollResponse::AuthError
        } else {
            PollResponse::TransportError(format!("server error: {error}"))
        };
    }

    let cursor = object.get("ts").and_then(Cursor::from_json);
    let updates = object.get("updates").and_then(Value::as_array);

    match (cursor, updates) {
        (Some(cursor), Some(updates)) => PollResponse::Success {
            cursor,
            updates: updates.iter().cloned().map(UpdateRecord::new).collect(),
        },
        _ => PollResponse::TransportError(format!("malformed success response: {body}")),
    }
}

/// Classify the outcome of a poll request, including transport failures.
pub fn classify_outcome(outcome: Result<Value, TransportError>) -> PollResponse {
    match outcome {
        Ok(body) => classify(&body),
        Err(TransportError::Unauthorized(_)) => PollResponse::AuthError,
        Err(e) => PollResponse::TransportError(e.to_string()),
    }
}

fn is_unauthorized(error: &Value) -> bool {
    let kind = match error {
        Value::String(s) => Some(s.as_str()),
        Value::Object(fields) => fields.get("type").and_then(Value::as_str),
        _ => None,
    };
    kind.is_some_and(|k| k.eq_ignore_ascii_case("unauthorized"))
}
