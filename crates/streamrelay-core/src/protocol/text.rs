//! JSON frame shapes.
//!
//! Upstream (browser -> relay) frames carry an `OutboundRequest`; downstream frames are
//! `InboundToken`s, plus `ErrorNotice`s the relay emits when it refuses a single frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `type` value shared by every reply token.
pub const MESSAGE_TYPE: &str = "message";
/// `type` value of relay error notices.
pub const ERROR_TYPE: &str = "error";

/// Attachment kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

/// Attachment descriptor embedded in the request JSON.
///
/// `content` holds base64 for images. It is always absent for video: video bytes travel as the
/// payload of a composite frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Request sent by the browser client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundRequest {
    #[serde(default)]
    pub activity_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub message: String,
    /// RFC 3339 timestamp set by the client.
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub user_meta: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaDescriptor>,
}

impl OutboundRequest {
    /// Interpret an arbitrary JSON value as a request without failing.
    ///
    /// Missing fields default, a non-string `message` is stringified, and a non-object value
    /// yields an empty request.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut obj) = value else {
            return Self::empty();
        };

        let message = match obj.remove("message") {
            Some(Value::String(s)) => s,
            None | Some(Value::Null) => String::new(),
            Some(other) => other.to_string(),
        };

        Self {
            activity_id: take_string(&mut obj, "activity_id").unwrap_or_default(),
            session_id: take_string(&mut obj, "session_id"),
            message,
            time: take_string(&mut obj, "time"),
            user_meta: obj.remove("user_meta").filter(|v| !v.is_null()),
            media: obj
                .remove("media")
                .and_then(|v| serde_json::from_value::<MediaDescriptor>(v).ok()),
        }
    }

    /// Request carrying only message text.
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::empty()
        }
    }

    fn empty() -> Self {
        Self {
            activity_id: String::new(),
            session_id: None,
            message: String::new(),
            time: None,
            user_meta: None,
            media: None,
        }
    }
}

fn take_string(obj: &mut serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match obj.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

/// One streamed reply token.
///
/// A reply is zero or more content tokens followed by exactly one token with
/// `isComplete: true` and no content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundToken {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, rename = "isComplete", skip_serializing_if = "Option::is_none")]
    pub is_complete: Option<bool>,
}

impl InboundToken {
    /// Content-bearing token.
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            kind: MESSAGE_TYPE.to_string(),
            content: Some(text.into()),
            is_complete: None,
        }
    }

    /// Terminal completion marker.
    pub fn complete() -> Self {
        Self {
            kind: MESSAGE_TYPE.to_string(),
            content: None,
            is_complete: Some(true),
        }
    }

    /// Parse a token out of a decoded JSON value; `None` for any other frame type.
    pub fn from_value(value: &Value) -> Option<Self> {
        if value.get("type").and_then(Value::as_str) != Some(MESSAGE_TYPE) {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete.unwrap_or(false)
    }
}

/// Per-frame refusal sent by the relay; the connection stays open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
    #[serde(rename = "type")]
    pub kind: String,
    pub code: String,
    pub message: String,
}

impl ErrorNotice {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            kind: ERROR_TYPE.to_string(),
            code: code.to_string(),
            message: message.into(),
        }
    }
}
