//! Event fan-out to subscribed consumers.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

use crate::event::{EventKind, LongPollEvent};

/// Identifier of one subscription.
pub type SubscriberId = u64;

struct Subscriber {
    kinds: Vec<EventKind>,
    tx: mpsc::UnboundedSender<LongPollEvent>,
}

#[derive(Default)]
struct SinkInner {
    subscribers: DashMap<SubscriberId, Subscriber>,
    next_id: AtomicU64,
}

/// Observable surface of the poll loop.
///
/// Each subscriber gets its own unbounded channel, so events reach every
/// subscriber in emission order and a slow consumer never stalls polling.
/// Subscribers whose receiving end is gone are pruned on the next emit.
#[derive(Clone, Default)]
pub struct EventSink {
    inner: Arc<SinkInner>,
}

impl EventSink {
    /// Create a sink with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every event kind.
    pub fn subscribe(&self) -> EventSubscription {
        self.subscribe_to(&EventKind::ALL)
    }

    /// Subscribe to the given event kinds only.
    pub fn subscribe_to(&self, kinds: &[EventKind]) -> EventSubscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        self.inner.subscribers.insert(
            id,
            Subscriber {
                kinds: kinds.to_vec(),
                tx,
            },
        );
        tracing::debug!(subscriber = id, ?kinds, "event subscriber added");

        EventSubscription {
            id,
            rx,
            sink: Arc::downgrade(&self.inner),
        }
    }

    /// Remove a subscriber. Returns false if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.inner.subscribers.remove(&id).is_some();
        if removed {
            tracing::debug!(subscriber = id, "event subscriber removed");
        }
        removed
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Deliver `event` to every subscriber of its kind.
    ///
    /// Returns the number of subscribers it was delivered to.
    pub fn emit(&self, event: LongPollEvent) -> usize {
        let kind = event.kind();
        let mut delivered = 0;
        let mut closed = Vec::new();

        for entry in self.inner.subscribers.iter() {
            if !entry.kinds.contains(&kind) {
                continue;
            }
            if entry.tx.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                closed.push(*entry.key());
            }
        }

        for id in closed {
            self.inner.subscribers.remove(&id);
            tracing::debug!(subscriber = id, "pruned closed event subscriber");
        }

        tracing::trace!(?kind, delivered, "event emitted");
        delivered
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Receiving end of one subscription.
///
/// Dropping it unsubscribes.
#[derive(Debug)]
pub struct EventSubscription {
    id: SubscriberId,
    rx: mpsc::UnboundedReceiver<LongPollEvent>,
    sink: Weak<SinkInner>,
}

impl EventSubscription {
    /// The subscriber id.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next event. Returns `None` once the sink is gone.
    pub async fn recv(&mut self) -> Option<LongPollEvent> {
        self.rx.recv().await
    }

    /// Take the next event if one is ready.
    pub fn try_recv(&mut self) -> Option<LongPollEvent> {
        self.rx.try_recv().ok()
    }

    /// Block the current thread until the next event.
    ///
    /// Must not be called from within an async runtime.
    pub fn blocking_recv(&mut self) -> Option<LongPollEvent> {
        self.rx.blocking_recv()
    }

    /// Unsubscribe explicitly.
    pub fn unsubscribe(self) {}
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.sink.upgrade() {
            inner.subscribers.remove(&self.id);
        }
    }
}
