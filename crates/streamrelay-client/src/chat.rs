//! Send path: turns user input into a request frame.
//!
//! Text and images travel as JSON text frames (images inline as base64). Video travels as a
//! composite binary frame whose metadata is the request itself.

use std::sync::Arc;

use base64::Engine;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};

use streamrelay_core::error::{RelayError, Result};
use streamrelay_core::protocol::{
    encode_composite, encode_text, MediaDescriptor, MediaKind, OutboundRequest, RawFrame,
};

use crate::assembler::ClientReplyAssembler;
use crate::connection::{ConnectionManager, SendStatus};
use crate::session::SessionStore;

/// A file picked by the user.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub kind: MediaKind,
    pub bytes: Bytes,
}

impl Attachment {
    pub fn image(bytes: impl Into<Bytes>) -> Self {
        Self {
            kind: MediaKind::Image,
            bytes: bytes.into(),
        }
    }

    pub fn video(bytes: impl Into<Bytes>) -> Self {
        Self {
            kind: MediaKind::Video,
            bytes: bytes.into(),
        }
    }

    /// Label shown for a message that carries only this attachment.
    pub fn placeholder(&self) -> &'static str {
        match self.kind {
            MediaKind::Image => "Photo",
            MediaKind::Video => "Video",
        }
    }
}

/// One chat view bound to an activity.
pub struct ChatSession {
    connection: ConnectionManager,
    assembler: Arc<ClientReplyAssembler>,
    sessions: SessionStore,
    activity_id: String,
    max_upload_bytes: usize,
}

impl ChatSession {
    pub fn new(
        connection: ConnectionManager,
        assembler: Arc<ClientReplyAssembler>,
        sessions: SessionStore,
        activity_id: impl Into<String>,
        max_upload_bytes: usize,
    ) -> Self {
        let activity_id = activity_id.into();
        match sessions.load(&activity_id) {
            Ok(Some(s)) => assembler.push_assistant_message(welcome(s.first_name())),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, %activity_id, "session record unavailable"),
        }
        Self {
            connection,
            assembler,
            sessions,
            activity_id,
            max_upload_bytes,
        }
    }

    pub fn activity_id(&self) -> &str {
        &self.activity_id
    }

    pub fn assembler(&self) -> &Arc<ClientReplyAssembler> {
        &self.assembler
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Send `text` and/or `attachment`.
    ///
    /// Oversize attachments are refused with `PAYLOAD_TOO_LARGE` before anything is shown or
    /// sent, and a send while the previous reply is still pending is refused with `BUSY`.
    /// When the connection is not open the frame is deferred until it is.
    pub fn send(&self, text: &str, attachment: Option<Attachment>) -> Result<SendStatus> {
        let text = text.trim();
        if text.is_empty() && attachment.is_none() {
            return Err(RelayError::BadRequest("nothing to send".into()));
        }
        if self.assembler.is_sending() {
            return Err(RelayError::Busy("previous reply still pending".into()));
        }
        if let Some(a) = &attachment {
            if a.bytes.len() > self.max_upload_bytes {
                return Err(RelayError::PayloadTooLarge {
                    size: a.bytes.len(),
                    limit: self.max_upload_bytes,
                });
            }
        }

        let request = self.build_request(text, attachment.as_ref());
        let frame = encode_frame(&request, attachment.as_ref())?;

        let shown = match &attachment {
            Some(a) if text.is_empty() => a.placeholder().to_string(),
            _ => text.to_string(),
        };
        self.assembler
            .push_user_message(shown, attachment.as_ref().map(|a| a.kind));

        let status = self.connection.send(frame);
        self.assembler.set_sending(true);
        tracing::debug!(
            activity_id = %self.activity_id,
            media = attachment.as_ref().map(|a| a.kind.as_str()).unwrap_or("none"),
            ?status,
            "request sent"
        );
        Ok(status)
    }

    fn build_request(&self, text: &str, attachment: Option<&Attachment>) -> OutboundRequest {
        let media = attachment.map(|a| MediaDescriptor {
            kind: a.kind,
            content: match a.kind {
                MediaKind::Image => {
                    Some(base64::engine::general_purpose::STANDARD.encode(&a.bytes))
                }
                MediaKind::Video => None,
            },
        });
        OutboundRequest {
            activity_id: self.activity_id.clone(),
            session_id: None,
            message: text.to_string(),
            time: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            user_meta: self.sessions.user_meta(&self.activity_id),
            media,
        }
    }
}

fn welcome(first_name: &str) -> String {
    format!("Hey {first_name}! I'm your on-site concierge. How can I help you today?")
}

fn encode_frame(request: &OutboundRequest, attachment: Option<&Attachment>) -> Result<RawFrame> {
    match attachment {
        Some(a) if a.kind == MediaKind::Video => {
            Ok(RawFrame::Binary(encode_composite(request, &a.bytes)?))
        }
        _ => Ok(RawFrame::Text(encode_text(request)?)),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use serde_json::Value;
    use streamrelay_core::protocol::decode_composite;

    fn req(msg: &str) -> OutboundRequest {
        OutboundRequest {
            activity_id: "evt1".into(),
            ..OutboundRequest::from_message(msg)
        }
    }

    #[test]
    fn video_goes_composite_without_inline_content() {
        let mut r = req("clip");
        r.media = Some(MediaDescriptor {
            kind: MediaKind::Video,
            content: None,
        });
        let a = Attachment::video(vec![1u8, 2, 3]);
        let RawFrame::Binary(b) = encode_frame(&r, Some(&a)).unwrap() else {
            panic!("expected binary frame");
        };
        let c = decode_composite(b).unwrap();
        assert_eq!(c.metadata["media"]["type"], "video");
        assert!(c.metadata["media"].get("content").is_none());
        assert_eq!(&c.media[..], &[1, 2, 3]);
    }

    #[test]
    fn text_goes_json() {
        let RawFrame::Text(t) = encode_frame(&req("hi"), None).unwrap() else {
            panic!("expected text frame");
        };
        let v: Value = serde_json::from_str(&t).unwrap();
        assert_eq!(v["message"], "hi");
        assert_eq!(v["session_id"], Value::Null);
    }

    #[test]
    fn welcome_uses_first_name() {
        assert_eq!(
            welcome("Ada"),
            "Hey Ada! I'm your on-site concierge. How can I help you today?"
        );
    }

    #[test]
    fn placeholders() {
        assert_eq!(Attachment::image(vec![0u8]).placeholder(), "Photo");
        assert_eq!(Attachment::video(vec![0u8]).placeholder(), "Video");
    }
}
