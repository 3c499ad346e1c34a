//! Realtime runtime for the gateway.
//!
//! One logical connection per client id; a reconnect supersedes the previous connection and
//! the generation counter lets late teardown of the old connection be ignored.

pub mod registry;

pub use registry::{ClientRegistry, Connection, Registration};
