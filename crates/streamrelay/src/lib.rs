//! Top-level facade crate for streamrelay.
//!
//! Re-exports the wire contracts, the gateway, and the client runtime so users can depend on a
//! single crate.

pub mod core {
    pub use streamrelay_core::*;
}

pub mod gateway {
    pub use streamrelay_gateway::*;
}

pub mod client {
    pub use streamrelay_client::*;
}
