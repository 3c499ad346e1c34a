//! Shared error type across streamrelay crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed request.
    BadRequest,
    /// Frame could not be decoded (bad length prefix, bad metadata).
    MalformedFrame,
    /// Payload too large.
    PayloadTooLarge,
    /// A reply is already streaming and the request queue is full.
    Busy,
    /// Not allowed.
    NotAllowed,
    /// Connection-level failure.
    Transport,
    /// Local persistence failure.
    Storage,
    /// Unsupported config/protocol version.
    UnsupportedVersion,
    /// Internal error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON notices.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::MalformedFrame => "MALFORMED_FRAME",
            ClientCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ClientCode::Busy => "BUSY",
            ClientCode::NotAllowed => "NOT_ALLOWED",
            ClientCode::Transport => "TRANSPORT",
            ClientCode::Storage => "STORAGE",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Unified error type used by core, gateway and client.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("payload too large: {size} bytes (limit {limit})")]
    PayloadTooLarge { size: usize, limit: usize },
    #[error("busy: {0}")]
    Busy(String),
    #[error("not allowed: {0}")]
    NotAllowed(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("storage unavailable: {0}")]
    Storage(String),
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl RelayError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            RelayError::BadRequest(_) => ClientCode::BadRequest,
            RelayError::MalformedFrame(_) => ClientCode::MalformedFrame,
            RelayError::Encode(_) => ClientCode::Internal,
            RelayError::PayloadTooLarge { .. } => ClientCode::PayloadTooLarge,
            RelayError::Busy(_) => ClientCode::Busy,
            RelayError::NotAllowed(_) => ClientCode::NotAllowed,
            RelayError::Transport(_) => ClientCode::Transport,
            RelayError::Storage(_) => ClientCode::Storage,
            RelayError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            RelayError::Internal(_) => ClientCode::Internal,
        }
    }
}
