//! Decode-once codec for the transport layer.
//!
//! - Text frames => request (JSON, or plain text when not JSON)
//! - Binary frames => request decoded from a composite frame (panic-free `bytes::Buf` parsing)
//! - Ping/Pong/Close are surfaced for lifecycle management

use axum::extract::ws::Message;
use bytes::Bytes;
use streamrelay_core::{
    error::{RelayError, Result},
    protocol::{self, DecodedFrame, RawFrame, RelayRequest},
};

/// Which frame shape carried a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Json,
    Plain,
    Composite,
}

impl FrameKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FrameKind::Json => "json",
            FrameKind::Plain => "plain",
            FrameKind::Composite => "composite",
        }
    }
}

#[derive(Debug)]
pub enum Inbound {
    Request {
        req: RelayRequest,
        kind: FrameKind,
        bytes_len: usize,
    },
    Ping(Vec<u8>),
    Pong,
    Close,
}

/// Cheap frame length (checked before any decoding).
pub fn frame_len(msg: &Message) -> usize {
    match msg {
        Message::Text(s) => s.len(),
        Message::Binary(b) => b.len(),
        Message::Ping(v) | Message::Pong(v) => v.len(),
        Message::Close(_) => 0,
    }
}

pub fn decode(msg: Message, max_frame_bytes: usize) -> Result<Inbound> {
    let bytes_len = frame_len(&msg);
    if bytes_len > max_frame_bytes {
        return Err(RelayError::PayloadTooLarge {
            size: bytes_len,
            limit: max_frame_bytes,
        });
    }

    let raw = match msg {
        Message::Text(s) => RawFrame::Text(s),
        Message::Binary(b) => RawFrame::Binary(Bytes::from(b)),
        Message::Ping(v) => return Ok(Inbound::Ping(v)),
        Message::Pong(_) => return Ok(Inbound::Pong),
        Message::Close(_) => return Ok(Inbound::Close),
    };

    let decoded = protocol::decode(raw)?;
    let kind = match &decoded {
        DecodedFrame::Json(_) => FrameKind::Json,
        DecodedFrame::PlainText(_) => FrameKind::Plain,
        DecodedFrame::Composite(_) => FrameKind::Composite,
    };
    Ok(Inbound::Request {
        req: RelayRequest::from_decoded(decoded),
        kind,
        bytes_len,
    })
}
