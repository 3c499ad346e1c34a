//! Logical connection lifecycle.
//!
//! One manager owns at most one live transport. It:
//! - connects single-flight (concurrent `ensure_connection` calls never open two transports)
//! - fans lifecycle events and inbound frames out to subscribers, in arrival order
//! - reconnects with bounded exponential backoff; an open resets the attempt counter
//! - holds one deferred frame while not open, sent right after the next open
//!
//! Each connect attempt gets a new generation; events from an older generation are discarded.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use streamrelay_core::protocol::RawFrame;

use crate::backoff::{Backoff, RetryPolicy};
use crate::events::{CloseInfo, Subscriber, SubscriberSet, Subscription};
use crate::timer::DelayedTask;
use crate::transport::{Connector, Incoming, Transport};

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Nothing attempted yet.
    Idle,
    Connecting,
    Open,
    /// Waiting for the backoff timer.
    Retrying,
    /// Closed by the caller, or retries exhausted.
    Closed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Retrying => "retrying",
            ConnectionState::Closed => "closed",
        }
    }
}

/// Result of [`ConnectionManager::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// Handed to the open transport.
    Sent,
    /// Held until the next successful open. Replaces any previously deferred frame.
    Deferred,
}

enum Outgoing {
    Frame(RawFrame),
    Close,
}

struct State {
    phase: ConnectionState,
    generation: u64,
    backoff: Backoff,
    writer: Option<mpsc::UnboundedSender<Outgoing>>,
    deferred: Option<RawFrame>,
    retry: Option<DelayedTask>,
}

struct Inner {
    connector: Arc<dyn Connector>,
    url: String,
    subscribers: Arc<SubscriberSet>,
    state: Mutex<State>,
}

/// Shared handle; clones refer to the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new<C: Connector>(connector: C, url: impl Into<String>, policy: RetryPolicy) -> Self {
        Self::with_connector(Arc::new(connector), url, policy)
    }

    pub fn with_connector(
        connector: Arc<dyn Connector>,
        url: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                url: url.into(),
                subscribers: Arc::new(SubscriberSet::new()),
                state: Mutex::new(State {
                    phase: ConnectionState::Idle,
                    generation: 0,
                    backoff: Backoff::new(policy),
                    writer: None,
                    deferred: None,
                    retry: None,
                }),
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().phase
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Reconnect attempts consumed since the last open.
    pub fn attempts(&self) -> u32 {
        self.inner.lock().backoff.attempts()
    }

    /// Start connecting unless a connection is already open or in progress. Must be called
    /// within a tokio runtime.
    ///
    /// While waiting on a backoff timer this connects immediately, keeping the attempt count.
    /// From `Idle` or `Closed` a fresh cycle starts with the attempt count reset.
    pub fn ensure_connection(&self) -> ConnectionState {
        Inner::ensure(&self.inner)
    }

    /// Register a subscriber. If the connection is already open it receives `on_open` at once.
    pub fn subscribe(&self, sub: Arc<dyn Subscriber>) -> Subscription {
        let handle = self.inner.subscribers.add(Arc::clone(&sub));
        if self.is_open() {
            sub.on_open();
        }
        handle
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Send now if open; otherwise keep `frame` as the single deferred frame and connect.
    pub fn send(&self, frame: RawFrame) -> SendStatus {
        {
            let mut st = self.inner.lock();
            let frame = match (st.phase, st.writer.as_ref()) {
                (ConnectionState::Open, Some(w)) => match w.send(Outgoing::Frame(frame)) {
                    Ok(()) => return SendStatus::Sent,
                    // pump already gone; keep the frame for the next open
                    Err(mpsc::error::SendError(Outgoing::Frame(f))) => f,
                    Err(mpsc::error::SendError(Outgoing::Close)) => return SendStatus::Deferred,
                },
                _ => frame,
            };
            if st.deferred.is_some() {
                tracing::debug!("replacing deferred frame");
            }
            st.deferred = Some(frame);
        }
        self.ensure_connection();
        SendStatus::Deferred
    }

    /// Close the transport and stop reconnecting. A later `send`/`ensure_connection` starts over.
    pub fn close(&self) {
        let was_live = {
            let mut st = self.inner.lock();
            let was_live = matches!(st.phase, ConnectionState::Open | ConnectionState::Connecting);
            st.generation += 1;
            st.phase = ConnectionState::Closed;
            st.deferred = None;
            st.backoff.reset();
            if let Some(t) = st.retry.take() {
                t.cancel();
            }
            if let Some(w) = st.writer.take() {
                let _ = w.send(Outgoing::Close);
            }
            was_live
        };
        tracing::info!(url = %self.inner.url, "connection closed by caller");
        if was_live {
            self.inner
                .subscribers
                .emit_close(&CloseInfo::new(Some(1000), "closed by client"));
        }
    }

    /// Close and drop every subscriber.
    pub fn dispose(&self) {
        self.close();
        self.inner.subscribers.clear();
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    fn ensure(this: &Arc<Self>) -> ConnectionState {
        let mut st = this.lock();
        match st.phase {
            ConnectionState::Connecting | ConnectionState::Open => {}
            ConnectionState::Retrying => {
                if let Some(t) = st.retry.take() {
                    t.cancel();
                }
                Self::start_connect(this, &mut st);
            }
            ConnectionState::Idle | ConnectionState::Closed => {
                st.backoff.reset();
                Self::start_connect(this, &mut st);
            }
        }
        st.phase
    }

    fn start_connect(this: &Arc<Self>, st: &mut State) {
        st.generation += 1;
        st.phase = ConnectionState::Connecting;
        st.writer = None;
        let generation = st.generation;
        tracing::debug!(url = %this.url, generation, attempt = st.backoff.attempts(), "connecting");
        tokio::spawn(Self::drive(Arc::clone(this), generation));
    }

    async fn drive(this: Arc<Self>, generation: u64) {
        let info = match this.connector.connect(&this.url).await {
            Ok(transport) => Self::run_open(&this, generation, transport).await,
            Err(e) => {
                if !this.is_current(generation) {
                    return;
                }
                tracing::warn!(url = %this.url, generation, error = %e, "connect failed");
                this.subscribers.emit_error(&e);
                Some(CloseInfo::new(None, e.to_string()))
            }
        };
        if let Some(info) = info {
            Self::on_closed(&this, generation, info);
        }
    }

    /// Pump an open transport until it ends. `None` when this generation was superseded.
    async fn run_open(this: &Arc<Self>, generation: u64, transport: Transport) -> Option<CloseInfo> {
        let Transport {
            mut sink,
            mut stream,
        } = transport;
        let (tx, mut rx) = mpsc::unbounded_channel::<Outgoing>();

        let accepted = {
            let mut st = this.lock();
            if st.generation == generation {
                st.phase = ConnectionState::Open;
                st.backoff.reset();
                st.writer = Some(tx.clone());
                Some(st.deferred.take())
            } else {
                None
            }
        };
        let Some(deferred) = accepted else {
            let _ = sink.close().await;
            return None;
        };
        if let Some(frame) = deferred {
            let _ = tx.send(Outgoing::Frame(frame));
        }
        drop(tx);

        tracing::info!(url = %this.url, generation, "connected");
        this.subscribers.emit_open();

        loop {
            tokio::select! {
                out = rx.recv() => match out {
                    Some(Outgoing::Frame(frame)) => {
                        if let Err(e) = sink.send(frame).await {
                            if this.is_current(generation) {
                                this.subscribers.emit_error(&e);
                            }
                            return Some(CloseInfo::new(None, e.to_string()));
                        }
                    }
                    Some(Outgoing::Close) | None => {
                        let _ = sink.close().await;
                        return None;
                    }
                },
                incoming = stream.next() => match incoming {
                    Some(Ok(Incoming::Frame(frame))) => {
                        if !this.is_current(generation) {
                            return None;
                        }
                        this.subscribers.emit_message(&frame);
                    }
                    Some(Ok(Incoming::Close(info))) => return Some(info),
                    Some(Err(e)) => {
                        if this.is_current(generation) {
                            this.subscribers.emit_error(&e);
                        }
                        return Some(CloseInfo::new(None, e.to_string()));
                    }
                    None => return Some(CloseInfo::new(None, "stream ended")),
                },
            }
        }
    }

    /// Transport ended: notify subscribers, then schedule a retry or give up.
    fn on_closed(this: &Arc<Self>, generation: u64, info: CloseInfo) {
        {
            let mut st = this.lock();
            if st.generation != generation {
                return;
            }
            st.writer = None;
            st.phase = ConnectionState::Retrying;
        }

        tracing::info!(url = %this.url, generation, code = ?info.code, reason = %info.reason, "disconnected");
        this.subscribers.emit_close(&info);

        let mut st = this.lock();
        // a subscriber may have closed or reconnected from its callback
        if st.generation != generation {
            return;
        }
        match st.backoff.next_delay() {
            Some(delay) => {
                tracing::info!(
                    url = %this.url,
                    attempt = st.backoff.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "scheduling reconnect"
                );
                let weak = Arc::downgrade(this);
                st.retry = Some(DelayedTask::spawn(delay, async move {
                    if let Some(inner) = weak.upgrade() {
                        Inner::fire_retry(&inner, generation);
                    }
                }));
            }
            None => {
                st.phase = ConnectionState::Closed;
                tracing::warn!(
                    url = %this.url,
                    attempts = st.backoff.attempts(),
                    "reconnect attempts exhausted; waiting for an explicit send"
                );
            }
        }
    }

    fn fire_retry(this: &Arc<Self>, generation: u64) {
        let mut st = this.lock();
        if st.phase != ConnectionState::Retrying || st.generation != generation {
            return;
        }
        if let Some(t) = st.retry.take() {
            t.disarm();
        }
        Self::start_connect(this, &mut st);
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.inner.url)
            .field("state", &self.state())
            .finish()
    }
}
