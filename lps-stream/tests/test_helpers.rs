//! Scripted collaborators for driving the poll loop without a network.
//!
//! - `ScriptedApi` answers directory calls from a queue and records when
//!   each call happened
//! - `ScriptedTransport` answers polls from a queue and records every URL
//! - `descriptor` / `poll_ok` build the JSON payloads the server would send

#![allow(dead_code)]

use async_trait::async_trait;
use lps_stream::{
    ApiClient, ApiError, CancellationToken, CursorStore, LongPollConfig, LongPollService,
    MemoryCursorStore, PollTransport, TransportError,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Notify};
use tokio::time::Instant;
use url::Url;

/// Directory payload for a server descriptor.
pub fn descriptor(server: &str, key: &str, ts: u64) -> Value {
    json!({ "server": server, "key": key, "ts": ts })
}

/// Successful poll body.
pub fn poll_ok(ts: u64, updates: Value) -> Value {
    json!({ "ts": ts, "updates": updates })
}

/// Poll body with a `failed` code.
pub fn poll_failed(code: i64, ts: u64) -> Value {
    json!({ "failed": code, "ts": ts })
}

/// Poll body the server sends for a revoked session.
pub fn poll_unauthorized() -> Value {
    json!({ "error": "unauthorized" })
}

/// Directory API answering from a queue.
///
/// Once the queue is empty every call fails with a network error.
#[derive(Default)]
pub struct ScriptedApi {
    responses: Mutex<VecDeque<Result<Value, ApiError>>>,
    calls: Mutex<Vec<Instant>>,
}

impl ScriptedApi {
    pub fn new(responses: Vec<Result<Value, ApiError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ApiClient for ScriptedApi {
    async fn call(&self, method: &str, _params: &[(&str, String)]) -> Result<Value, ApiError> {
        assert_eq!(method, "messages.getLongPollServer");
        self.calls.lock().unwrap().push(Instant::now());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Network("script exhausted".to_string())))
    }
}

/// One scripted answer of [`ScriptedTransport`].
pub enum PollStep {
    /// Answer immediately
    Respond(Value),
    /// Fail immediately
    Fail(TransportError),
    /// Answer once `release` is notified, ignoring cancellation
    Hold { release: Arc<Notify>, body: Value },
}

/// Poll transport answering from a queue.
///
/// Once the queue is empty a poll hangs until it is cancelled, like a long
/// poll on a quiet stream.
#[derive(Default)]
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<PollStep>>,
    urls: Mutex<Vec<Url>>,
    started: Notify,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<PollStep>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            urls: Mutex::new(Vec::new()),
            started: Notify::new(),
        })
    }

    /// Every URL polled so far.
    pub fn urls(&self) -> Vec<Url> {
        self.urls.lock().unwrap().clone()
    }

    /// The `ts` parameter of every poll so far.
    pub fn polled_cursors(&self) -> Vec<u64> {
        self.urls()
            .iter()
            .filter_map(|url| {
                url.query_pairs()
                    .find(|(name, _)| name == "ts")
                    .and_then(|(_, value)| value.parse().ok())
            })
            .collect()
    }

    /// Wait until at least `count` polls have been issued.
    pub async fn wait_for_polls(&self, count: usize) {
        while self.urls.lock().unwrap().len() < count {
            self.started.notified().await;
        }
    }
}

#[async_trait]
impl PollTransport for ScriptedTransport {
    async fn poll(&self, url: &Url, cancel: &CancellationToken) -> Result<Value, TransportError> {
        self.urls.lock().unwrap().push(url.clone());
        self.started.notify_one();

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(PollStep::Respond(body)) => Ok(body),
            Some(PollStep::Fail(error)) => Err(error),
            Some(PollStep::Hold { release, body }) => {
                release.notified().await;
                Ok(body)
            }
            None => {
                cancel.cancelled().await;
                Err(TransportError::Cancelled)
            }
        }
    }
}

/// A service wired to scripted collaborators.
pub struct Harness {
    pub service: LongPollService,
    pub api: Arc<ScriptedApi>,
    pub transport: Arc<ScriptedTransport>,
    pub cursors: Arc<MemoryCursorStore>,
    pub auth: watch::Sender<bool>,
}

impl Harness {
    pub fn new(api: Arc<ScriptedApi>, transport: Arc<ScriptedTransport>) -> Self {
        Self::with_store(api, transport, MemoryCursorStore::new(), LongPollConfig::default())
    }

    pub fn with_store(
        api: Arc<ScriptedApi>,
        transport: Arc<ScriptedTransport>,
        store: MemoryCursorStore,
        config: LongPollConfig,
    ) -> Self {
        let (auth, auth_rx) = watch::channel(true);
        let cursors = Arc::new(store);
        let service = LongPollService::builder()
            .with_config(config)
            .with_api_client(api.clone())
            .with_transport(transport.clone())
            .with_cursor_store(cursors.clone() as Arc<dyn CursorStore>)
            .with_auth_feed(auth_rx)
            .build()
            .expect("valid configuration");

        Self {
            service,
            api,
            transport,
            cursors,
            auth,
        }
    }
}
