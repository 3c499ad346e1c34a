//! Composite binary frame (JSON metadata + raw media, panic-free).
//!
//! Layout: 4-byte unsigned big-endian length `N`, then `N` bytes of UTF-8 JSON metadata, then
//! the remaining bytes as the media payload.
//!
//! Parsing rules:
//! - Never index (`buf[0]`) — always use `Buf` and `remaining()` checks.
//! - No size ceiling at this layer; upload limits belong to the caller.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Serialize;
use serde_json::Value;

use crate::error::{RelayError, Result};

/// Width of the metadata length prefix.
pub const LENGTH_PREFIX_BYTES: usize = 4;

/// Decoded composite frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeFrame {
    /// Parsed JSON metadata segment.
    pub metadata: Value,
    /// Raw media payload (zero-copy slice of the frame).
    pub media: Bytes,
}

/// Build a composite frame from serialisable metadata and raw media bytes.
pub fn encode_composite<T: Serialize + ?Sized>(metadata: &T, media: &[u8]) -> Result<Bytes> {
    let meta = serde_json::to_vec(metadata)
        .map_err(|e| RelayError::Encode(format!("composite metadata: {e}")))?;
    let declared = u32::try_from(meta.len())
        .map_err(|_| RelayError::Encode("composite metadata exceeds u32 length".into()))?;

    let mut out = BytesMut::with_capacity(LENGTH_PREFIX_BYTES + meta.len() + media.len());
    out.put_u32(declared);
    out.put_slice(&meta);
    out.put_slice(media);
    Ok(out.freeze())
}

/// Decode a composite frame.
pub fn decode_composite(mut buf: Bytes) -> Result<CompositeFrame> {
    if buf.remaining() < LENGTH_PREFIX_BYTES {
        return Err(RelayError::MalformedFrame(format!(
            "composite frame too short ({} bytes)",
            buf.remaining()
        )));
    }

    let declared = buf.get_u32() as usize;
    if buf.remaining() < declared {
        return Err(RelayError::MalformedFrame(format!(
            "declared metadata length {declared} exceeds remaining {} bytes",
            buf.remaining()
        )));
    }

    let meta = buf.split_to(declared);
    let metadata: Value = serde_json::from_slice(&meta)
        .map_err(|e| RelayError::MalformedFrame(format!("composite metadata json: {e}")))?;

    Ok(CompositeFrame {
        metadata,
        media: buf,
    })
}
