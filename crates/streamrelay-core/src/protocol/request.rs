//! Server-side view of one decoded request.

use bytes::Bytes;

use crate::protocol::frame::DecodedFrame;
use crate::protocol::text::{MediaKind, OutboundRequest};

/// A request plus any media bytes that arrived in the same composite frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayRequest {
    pub request: OutboundRequest,
    /// Raw media payload (video uploads only).
    pub media: Option<Bytes>,
}

impl RelayRequest {
    /// Interpret any decoded frame as a request. Plain text becomes the message.
    pub fn from_decoded(frame: DecodedFrame) -> Self {
        match frame {
            DecodedFrame::Json(v) => Self {
                request: OutboundRequest::from_value(v),
                media: None,
            },
            DecodedFrame::PlainText(s) => Self {
                request: OutboundRequest::from_message(s),
                media: None,
            },
            DecodedFrame::Composite(c) => Self {
                request: OutboundRequest::from_value(c.metadata),
                media: Some(c.media),
            },
        }
    }

    /// Message text with surrounding whitespace removed.
    pub fn trimmed_message(&self) -> &str {
        self.request.message.trim()
    }

    /// Kind of the attached media, if any.
    pub fn media_kind(&self) -> Option<MediaKind> {
        match (&self.request.media, &self.media) {
            (Some(d), _) => Some(d.kind),
            (None, Some(_)) => Some(MediaKind::Video),
            (None, None) => None,
        }
    }

    pub fn media_len(&self) -> usize {
        self.media.as_ref().map(Bytes::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::composite::CompositeFrame;
    use serde_json::json;

    #[test]
    fn composite_metadata_becomes_request() {
        let r = RelayRequest::from_decoded(DecodedFrame::Composite(CompositeFrame {
            metadata: json!({"message": "look", "activity_id": "evt1"}),
            media: Bytes::from_static(b"\x00\x00\x00\x18ftyp"),
        }));
        assert_eq!(r.request.message, "look");
        assert_eq!(r.media_kind(), Some(MediaKind::Video));
        assert_eq!(r.media_len(), 8);
    }

    #[test]
    fn plain_text_is_the_message() {
        let r = RelayRequest::from_decoded(DecodedFrame::PlainText("  hi  ".into()));
        assert_eq!(r.trimmed_message(), "hi");
        assert_eq!(r.media_kind(), None);
    }
}
