//! streamrelay core: transport-agnostic wire contracts and the shared error type.
//!
//! This crate defines the frame codec (JSON text frames and length-prefixed composite binary
//! frames), the request/token shapes exchanged between browser clients and the relay, the
//! whitespace-preserving tokenizer used for streamed replies, and activity-status parsing.
//! It carries no transport or runtime dependencies so the gateway and the client runtime can
//! both build on it.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Every fallible path surfaces as
//! `RelayError`/`Result`, so a malformed frame costs one frame, never the process.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod activity;
pub mod error;
pub mod protocol;
pub mod tokens;

/// Shared result type.
pub use error::{Result, RelayError};
