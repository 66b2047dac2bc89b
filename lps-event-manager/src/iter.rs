//! Blocking access to long-poll events
//!
//! All iterators returned by one manager share a single receiver, so each
//! event is delivered to exactly one of them.

use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use lps_stream::LongPollEvent;

/// Blocking iterator over long-poll events
///
/// `next()` blocks until an event arrives and ends once the worker has shut
/// down.
pub struct LongPollEventIterator {
    rx: Arc<Mutex<mpsc::Receiver<LongPollEvent>>>,
}

impl LongPollEventIterator {
    pub(crate) fn new(rx: Arc<Mutex<mpsc::Receiver<LongPollEvent>>>) -> Self {
        Self { rx }
    }

    /// Block until an event is available
    ///
    /// Returns `None` once the worker has shut down.
    pub fn recv(&self) -> Option<LongPollEvent> {
        self.rx.lock().ok()?.recv().ok()
    }

    /// Take an event if one is already queued
    pub fn try_recv(&self) -> Option<LongPollEvent> {
        self.rx.lock().ok()?.try_recv().ok()
    }

    /// Block for at most `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Option<LongPollEvent> {
        self.rx.lock().ok()?.recv_timeout(timeout).ok()
    }

    /// Iterate over the events queued right now without blocking
    pub fn try_iter(&self) -> TryIter<'_> {
        TryIter { inner: self }
    }

    /// Iterate until no event arrives within `timeout`
    pub fn timeout_iter(&self, timeout: Duration) -> TimeoutIter<'_> {
        TimeoutIter {
            inner: self,
            timeout,
        }
    }

    /// Block until an event matching `predicate` arrives or `timeout`
    /// elapses, discarding everything else in between.
    pub fn wait_for<F>(&self, timeout: Duration, mut predicate: F) -> Option<LongPollEvent>
    where
        F: FnMut(&LongPollEvent) -> bool,
    {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.checked_duration_since(std::time::Instant::now())?;
            let event = self.recv_timeout(remaining)?;
            if predicate(&event) {
                return Some(event);
            }
        }
    }
}

impl Iterator for LongPollEventIterator {
    type Item = LongPollEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

impl Clone for LongPollEventIterator {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}

/// Non-blocking iterator over queued events
pub struct TryIter<'a> {
    inner: &'a LongPollEventIterator,
}

impl<'a> Iterator for TryIter<'a> {
    type Item = LongPollEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.try_recv()
    }
}

/// Blocking iterator that ends after `timeout` of silence
pub struct TimeoutIter<'a> {
    inner: &'a LongPollEventIterator,
    timeout: Duration,
}

impl<'a> Iterator for TimeoutIter<'a> {
    type Item = LongPollEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.recv_timeout(self.timeout)
    }
}
