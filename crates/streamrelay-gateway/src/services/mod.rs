//! Reply services.
//!
//! - `agent`: turns a request into reply text (the echo agent stands in for a real one)
//! - `streamer`: paces the reply out as ordered tokens followed by one completion marker

pub mod agent;
pub mod streamer;

pub use agent::{EchoAgent, ReplyAgent};
pub use streamer::{ReplyStreamer, TokenSink};
