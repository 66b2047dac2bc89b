//! Core types for the lps-stream crate.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Feature-flag value sent with every poll request.
pub const LONG_POLL_MODE: u32 = 2;

/// Position in the update stream, as assigned by the long-poll server (`ts`).
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(pub u64);

impl Cursor {
    /// Create a new cursor.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw cursor value.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Read a cursor from a JSON value.
    ///
    /// The server sends `ts` as a number, but some API versions send it as a
    /// numeric string. Anything else yields `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(Self),
            Value::String(s) => s.trim().parse::<u64>().ok().map(Self),
            _ => None,
        }
    }
}

impl From<u64> for Cursor {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Long-poll server descriptor returned by the directory call.
///
/// One descriptor belongs to one polling session. It is replaced wholesale on
/// every (re)acquisition and only its `cursor` changes in between.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ServerDescriptor {
    /// Host and path of the long-poll endpoint, without scheme
    pub host: String,
    /// Short-lived access key for this long-poll session
    pub access_key: String,
    /// Position of the next poll
    pub cursor: Cursor,
    /// Feature flags sent with each poll
    pub mode: u32,
}

impl ServerDescriptor {
    /// Create a descriptor with the fixed long-poll mode.
    pub fn new(host: impl Into<String>, access_key: impl Into<String>, cursor: Cursor) -> Self {
        Self {
            host: host.into(),
            access_key: access_key.into(),
            cursor,
            mode: LONG_POLL_MODE,
        }
    }

    /// Build the poll request URL for the current cursor.
    ///
    /// `http://{host}?act=a_check&key={key}&ts={cursor}&wait={wait}&mode={mode}`
    pub fn poll_url(&self, wait: Duration) -> Result<Url, url::ParseError> {
        let host = self
            .host
            .trim_start_matches("https://")
            .trim_start_matches("http://");
        let mut url = Url::parse(&format!("http://{host}"))?;
        url.query_pairs_mut()
            .clear()
            .append_pair("act", "a_check")
            .append_pair("key", &self.access_key)
            .append_pair("ts", &self.cursor.to_string())
            .append_pair("wait", &wait.as_secs().to_string())
            .append_pair("mode", &self.mode.to_string());
        Ok(url)
    }
}

/// One opcode-tagged update record from a poll response.
///
/// The record is kept as raw JSON so that a malformed entry can still be
/// carried through decoding and logged.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdateRecord(pub Value);

impl UpdateRecord {
    /// Wrap a raw JSON value.
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    /// The leading integer opcode, if the record is a well-formed tuple.
    pub fn opcode(&self) -> Option<i64> {
        self.0.as_array()?.first()?.as_i64()
    }

    /// Field at `index` (the opcode is field 0).
    pub fn field(&self, index: usize) -> Option<&Value> {
        self.0.as_array()?.get(index)
    }

    /// Access the raw JSON.
    pub fn raw(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for UpdateRecord {
    fn from(raw: Value) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for UpdateRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a poll loop stopped for good.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TerminationReason {
    /// The session lost its authorization
    Unauthorized,
    /// The loop was stopped by its owner
    Stopped,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cursor_from_json() {
        assert_eq!(Cursor::from_json(&json!(1700)), Some(Cursor(1700)));
        assert_eq!(Cursor::from_json(&json!("1700")), Some(Cursor(1700)));
        assert_eq!(Cursor::from_json(&json!(-1)), None);
        assert_eq!(Cursor::from_json(&json!("abc")), None);
        assert_eq!(Cursor::from_json(&json!(null)), None);
    }

    #[test]
    fn test_poll_url() {
        let server = ServerDescriptor::new("imv4.vk.com/im0123", "abc123", Cursor(100));
        let url = server.poll_url(Duration::from_secs(25)).unwrap();

        assert_eq!(
            url.as_str(),
            "http://imv4.vk.com/im0123?act=a_check&key=abc123&ts=100&wait=25&mode=2"
        );
    }

    #[test]
    fn test_poll_url_strips_scheme() {
        let server = ServerDescriptor::new("https://lp.example.com/poll", "k", Cursor(7));
        let url = server.poll_url(Duration::from_secs(25)).unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.host_str(), Some("lp.example.com"));
    }

    #[test]
    fn test_poll_url_rejects_empty_host() {
        let server = ServerDescriptor::new("", "k", Cursor(7));
        assert!(server.poll_url(Duration::from_secs(25)).is_err());
    }

    #[test]
    fn test_update_record_accessors() {
        let record = UpdateRecord::new(json!([8, -42, 7]));
        assert_eq!(record.opcode(), Some(8));
        assert_eq!(record.field(1), Some(&json!(-42)));
        assert_eq!(record.field(5), None);

        let malformed = UpdateRecord::new(json!({"type": 4}));
        assert_eq!(malformed.opcode(), None);
        assert_eq!(malformed.field(0), None);
    }

    #[test]
    fn test_termination_reason_display() {
        assert_eq!(TerminationReason::Unauthorized.to_string(), "unauthorized");
        assert_eq!(TerminationReason::Stopped.to_string(), "stopped");
    }
}
