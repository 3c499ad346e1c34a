//! Client-side reply assembly.
//!
//! Tokens are queued as they arrive and rendered into the active assistant message one per
//! tick, so bursts from the network still render smoothly. The completion marker only sets a
//! flag; the drain loop finalizes once the queue is empty, so nothing buffered is lost.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use uuid::Uuid;

use streamrelay_core::error::RelayError;
use streamrelay_core::protocol::{InboundToken, MediaKind, RawFrame};

use crate::config::RenderSection;
use crate::events::{CloseInfo, Subscriber};
use crate::timer::DelayedTask;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the visible message list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub attachment: Option<MediaKind>,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>, attachment: Option<MediaKind>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            attachment,
        }
    }
}

#[derive(Default)]
struct State {
    messages: Vec<ChatMessage>,
    /// Index of the assistant message currently being streamed into.
    active: Option<usize>,
    queue: VecDeque<String>,
    complete_pending: bool,
    sending: bool,
    connected: bool,
    flush: Option<DelayedTask>,
    disposed: bool,
}

type Shared = Arc<Mutex<State>>;

fn lock(s: &Shared) -> MutexGuard<'_, State> {
    s.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Rebuilds streamed replies into the message list. Register it with
/// [`crate::ConnectionManager::subscribe`].
pub struct ClientReplyAssembler {
    state: Shared,
    render: RenderSection,
}

impl ClientReplyAssembler {
    pub fn new(render: RenderSection) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            render,
        }
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        lock(&self.state).messages.clone()
    }

    /// Content of the most recent assistant message, if any.
    pub fn last_reply(&self) -> Option<String> {
        lock(&self.state)
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.clone())
    }

    pub fn is_sending(&self) -> bool {
        lock(&self.state).sending
    }

    pub fn set_sending(&self, sending: bool) {
        lock(&self.state).sending = sending;
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    /// A reply is being rendered.
    pub fn is_streaming(&self) -> bool {
        lock(&self.state).active.is_some()
    }

    /// Tokens received but not yet rendered.
    pub fn pending_tokens(&self) -> usize {
        lock(&self.state).queue.len()
    }

    pub fn push_user_message(&self, content: impl Into<String>, attachment: Option<MediaKind>) {
        lock(&self.state)
            .messages
            .push(ChatMessage::new(Role::User, content, attachment));
    }

    pub fn push_assistant_message(&self, content: impl Into<String>) {
        lock(&self.state)
            .messages
            .push(ChatMessage::new(Role::Assistant, content, None));
    }

    /// Cancel the pacing task and ignore further events.
    pub fn dispose(&self) {
        let mut st = lock(&self.state);
        st.disposed = true;
        if let Some(t) = st.flush.take() {
            t.cancel();
        }
    }

    fn handle_text(&self, text: &str) {
        let value: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(_) => {
                // not JSON: show verbatim, outside the token path
                lock(&self.state)
                    .messages
                    .push(ChatMessage::new(Role::Assistant, text, None));
                return;
            }
        };

        let Some(token) = InboundToken::from_value(&value) else {
            if value.get("type").and_then(Value::as_str) == Some("error") {
                let code = value.get("code").and_then(Value::as_str).unwrap_or("");
                let message = value.get("message").and_then(Value::as_str).unwrap_or("");
                tracing::warn!(code, message, "relay refused a frame");
            }
            return;
        };

        let mut st = lock(&self.state);
        if let Some(content) = token.content.as_ref() {
            if st.complete_pending {
                // next reply started before the previous one finished rendering
                finish_reply(&mut st);
            }
            if st.active.is_none() {
                st.messages.push(ChatMessage::new(Role::Assistant, "", None));
                st.active = Some(st.messages.len() - 1);
            }
            st.queue.push_back(content.clone());
        }
        if token.is_complete() {
            st.complete_pending = true;
        }
        self.schedule_flush(&mut st);
    }

    fn schedule_flush(&self, st: &mut State) {
        if st.flush.is_some() {
            return;
        }
        let shared = Arc::clone(&self.state);
        let drain = self.render.drain();
        st.flush = Some(DelayedTask::spawn(self.render.schedule(), async move {
            loop {
                if !flush_tick(&shared) {
                    return;
                }
                tokio::time::sleep(drain).await;
            }
        }));
    }
}

/// Render one queued token. Returns `false` once the queue is drained; at that point a
/// pending completion finalizes the reply.
fn flush_tick(shared: &Shared) -> bool {
    let mut st = lock(shared);
    if let Some(idx) = st.active {
        if let Some(token) = st.queue.pop_front() {
            if let Some(msg) = st.messages.get_mut(idx) {
                msg.content.push_str(&token);
            }
            return true;
        }
    }
    if st.complete_pending {
        finish_reply(&mut st);
    }
    if let Some(t) = st.flush.take() {
        t.disarm();
    }
    false
}

/// Render whatever is still queued into the active message and close it.
fn finish_reply(st: &mut State) {
    let rest: String = st.queue.drain(..).collect();
    if let Some(idx) = st.active {
        if let Some(msg) = st.messages.get_mut(idx) {
            msg.content.push_str(&rest);
        }
    }
    st.complete_pending = false;
    st.active = None;
    st.sending = false;
}

impl Default for ClientReplyAssembler {
    fn default() -> Self {
        Self::new(RenderSection::default())
    }
}

impl Drop for ClientReplyAssembler {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Subscriber for ClientReplyAssembler {
    fn on_open(&self) {
        lock(&self.state).connected = true;
    }

    fn on_close(&self, _info: &CloseInfo) {
        let mut st = lock(&self.state);
        st.connected = false;
        st.sending = false;
    }

    fn on_error(&self, _err: &RelayError) {
        lock(&self.state).connected = false;
    }

    fn on_message(&self, frame: &RawFrame) {
        if lock(&self.state).disposed {
            return;
        }
        match frame {
            RawFrame::Text(t) => self.handle_text(t),
            RawFrame::Binary(b) => {
                tracing::debug!(bytes = b.len(), "ignoring binary frame from relay");
            }
        }
    }
}
