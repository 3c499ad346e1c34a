//! Protocol modules (text frames + composite binary frames).
//!
//! Two frame shapes share one connection:
//! - Text: a JSON object (`OutboundRequest` upstream, `InboundToken` downstream).
//! - Composite binary: `[u32 BE metadata length][JSON metadata][raw media bytes]`, used for
//!   video attachments so media never has to be base64-inflated into JSON.
//!
//! All parsers are panic-free: malformed input is reported as `RelayError` instead of
//! panicking or indexing raw buffers.

pub mod composite;
pub mod frame;
pub mod request;
pub mod text;

pub use composite::{decode_composite, encode_composite, CompositeFrame, LENGTH_PREFIX_BYTES};
pub use frame::{decode, encode_text, DecodedFrame, RawFrame};
pub use request::RelayRequest;
pub use text::{ErrorNotice, InboundToken, MediaDescriptor, MediaKind, OutboundRequest};
