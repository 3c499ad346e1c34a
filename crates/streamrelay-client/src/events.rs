//! Connection event fan-out.
//!
//! Subscribers are passive readers: they observe lifecycle events and inbound frames but
//! cannot touch the connection except through the manager's public API.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use streamrelay_core::error::RelayError;
use streamrelay_core::protocol::RawFrame;

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CloseInfo {
    /// WebSocket close code, when the peer sent one.
    pub code: Option<u16>,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// Connection observer. Every callback defaults to a no-op.
pub trait Subscriber: Send + Sync {
    fn on_open(&self) {}
    fn on_close(&self, _info: &CloseInfo) {}
    fn on_error(&self, _err: &RelayError) {}
    fn on_message(&self, _frame: &RawFrame) {}
}

/// Ordered set of subscribers.
#[derive(Default)]
pub struct SubscriberSet {
    inner: Mutex<SetInner>,
}

#[derive(Default)]
struct SetInner {
    next_id: u64,
    entries: Vec<(u64, Arc<dyn Subscriber>)>,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SetInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(self: &Arc<Self>, sub: Arc<dyn Subscriber>) -> Subscription {
        let mut g = self.lock();
        let id = g.next_id;
        g.next_id += 1;
        g.entries.push((id, sub));
        Subscription {
            set: Arc::downgrade(self),
            id: Some(id),
        }
    }

    fn remove(&self, id: u64) -> bool {
        let mut g = self.lock();
        let before = g.entries.len();
        g.entries.retain(|(i, _)| *i != id);
        g.entries.len() != before
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current subscribers; callbacks run outside the lock so they may
    /// (un)subscribe or send.
    fn snapshot(&self) -> Vec<Arc<dyn Subscriber>> {
        self.lock().entries.iter().map(|(_, s)| Arc::clone(s)).collect()
    }

    pub fn emit_open(&self) {
        for s in self.snapshot() {
            s.on_open();
        }
    }

    pub fn emit_close(&self, info: &CloseInfo) {
        for s in self.snapshot() {
            s.on_close(info);
        }
    }

    pub fn emit_error(&self, err: &RelayError) {
        for s in self.snapshot() {
            s.on_error(err);
        }
    }

    pub fn emit_message(&self, frame: &RawFrame) {
        for s in self.snapshot() {
            s.on_message(frame);
        }
    }
}

/// Registration handle. Dropping it (or calling [`Subscription::unsubscribe`]) removes exactly
/// this registration.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    set: Weak<SubscriberSet>,
    id: Option<u64>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let (Some(id), Some(set)) = (self.id.take(), self.set.upgrade()) {
            set.remove(id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
