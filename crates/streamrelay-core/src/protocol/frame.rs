//! Frame-level codec shared by both ends of the connection.
//!
//! - Text frames => JSON value, or the literal text when it is not JSON
//! - Binary frames => `CompositeFrame` (panic-free `bytes::Buf` parsing)

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use crate::error::{RelayError, Result};
use crate::protocol::composite::{decode_composite, CompositeFrame};

/// Transport-neutral data frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFrame {
    Text(String),
    Binary(Bytes),
}

impl RawFrame {
    pub fn len(&self) -> usize {
        match self {
            RawFrame::Text(s) => s.len(),
            RawFrame::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of decoding one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedFrame {
    /// Text frame that parsed as JSON.
    Json(Value),
    /// Text frame that did not parse; carried verbatim.
    PlainText(String),
    /// Binary composite frame.
    Composite(CompositeFrame),
}

/// Serialise one payload into one text frame.
pub fn encode_text<T: Serialize + ?Sized>(payload: &T) -> Result<String> {
    serde_json::to_string(payload).map_err(|e| RelayError::Encode(format!("json: {e}")))
}

/// Decode one frame.
///
/// Text never fails (non-JSON degrades to `PlainText`); binary fails with `MalformedFrame` when
/// the length prefix is inconsistent with the frame.
pub fn decode(frame: RawFrame) -> Result<DecodedFrame> {
    match frame {
        RawFrame::Text(s) => match serde_json::from_str::<Value>(&s) {
            Ok(v) => Ok(DecodedFrame::Json(v)),
            Err(_) => {
                tracing::trace!(len = s.len(), "text frame is not JSON; treating as plain text");
                Ok(DecodedFrame::PlainText(s))
            }
        },
        RawFrame::Binary(b) => decode_composite(b).map(DecodedFrame::Composite),
    }
}
