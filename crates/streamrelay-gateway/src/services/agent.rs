use async_trait::async_trait;

use streamrelay_core::error::Result;
use streamrelay_core::protocol::RelayRequest;

/// Produces the full reply text for one request.
#[async_trait]
pub trait ReplyAgent: Send + Sync {
    fn name(&self) -> &'static str;
    async fn compose(&self, client_id: &str, req: &RelayRequest) -> Result<String>;
}

/// Placeholder agent: echoes the message back, or greets when there is nothing to echo.
#[derive(Default)]
pub struct EchoAgent;

impl EchoAgent {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReplyAgent for EchoAgent {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn compose(&self, client_id: &str, req: &RelayRequest) -> Result<String> {
        if let Some(kind) = req.media_kind() {
            tracing::debug!(
                client_id,
                activity_id = %req.request.activity_id,
                media = kind.as_str(),
                media_bytes = req.media_len(),
                "request carries media"
            );
        }

        let msg = req.trimmed_message();
        if msg.is_empty() {
            Ok(format!("Hello from server ({client_id})"))
        } else {
            Ok(format!("Echo ({client_id}): {msg}"))
        }
    }
}
