use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};

use streamrelay_core::error::{RelayError, Result};
use streamrelay_core::protocol::{encode_text, ErrorNotice, InboundToken, RelayRequest};
use streamrelay_core::tokens::segments;

use super::agent::ReplyAgent;

/// Destination for streamed tokens.
#[async_trait]
pub trait TokenSink: Send {
    async fn emit(&mut self, token: InboundToken) -> Result<()>;
    async fn notice(&mut self, notice: ErrorNotice) -> Result<()>;
}

#[async_trait]
impl TokenSink for mpsc::Sender<Message> {
    async fn emit(&mut self, token: InboundToken) -> Result<()> {
        let text = encode_text(&token)?;
        self.send(Message::Text(text))
            .await
            .map_err(|_| RelayError::Transport("outbound channel closed".into()))
    }

    async fn notice(&mut self, notice: ErrorNotice) -> Result<()> {
        let text = encode_text(&notice)?;
        self.send(Message::Text(text))
            .await
            .map_err(|_| RelayError::Transport("outbound channel closed".into()))
    }
}

/// Turns requests into paced token streams.
pub struct ReplyStreamer {
    agent: Arc<dyn ReplyAgent>,
    interval: Duration,
}

impl ReplyStreamer {
    pub fn new(agent: Arc<dyn ReplyAgent>, interval: Duration) -> Self {
        Self { agent, interval }
    }

    pub fn agent_name(&self) -> &'static str {
        self.agent.name()
    }

    /// Stream `reply` token by token, then the completion marker.
    ///
    /// The first token goes out immediately; every following token and the marker wait one
    /// interval.
    pub async fn stream<S: TokenSink + ?Sized>(&self, reply: &str, sink: &mut S) -> Result<usize> {
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut sent = 0usize;
        for token in segments(reply) {
            tick.tick().await;
            sink.emit(InboundToken::content(token)).await?;
            sent += 1;
        }
        tick.tick().await;
        sink.emit(InboundToken::complete()).await?;
        Ok(sent)
    }

    /// Compose and stream a reply for one request.
    ///
    /// An agent failure is reported as a notice followed by the completion marker so the
    /// client does not wait forever.
    pub async fn reply<S: TokenSink + ?Sized>(
        &self,
        client_id: &str,
        req: &RelayRequest,
        sink: &mut S,
    ) -> Result<usize> {
        match self.agent.compose(client_id, req).await {
            Ok(text) => self.stream(&text, sink).await,
            Err(e) => {
                tracing::warn!(client_id, agent = self.agent.name(), error = %e, "agent failed");
                sink.notice(ErrorNotice::new(e.client_code().as_str(), e.to_string()))
                    .await?;
                sink.emit(InboundToken::complete()).await?;
                Ok(0)
            }
        }
    }

    /// Spawn the reply for `req`; `done` fires when the stream ends (success or not).
    pub fn start_reply(
        self: &Arc<Self>,
        client_id: String,
        req: RelayRequest,
        mut sink: mpsc::Sender<Message>,
        done: mpsc::UnboundedSender<()>,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            match this.reply(&client_id, &req, &mut sink).await {
                Ok(tokens) => tracing::debug!(client_id = %client_id, tokens, "reply complete"),
                Err(e) => tracing::debug!(client_id = %client_id, error = %e, "reply aborted"),
            }
            let _ = done.send(());
        })
    }
}
