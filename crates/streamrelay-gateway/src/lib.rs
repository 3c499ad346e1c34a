//! streamrelay gateway library entry.
//!
//! This crate wires the WebSocket transport, the client registry, and the reply pipeline into
//! a relay that serves many browser clients concurrently, one logical connection per client
//! id. It is consumed by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod obs;
pub mod ops;
pub mod realtime;
pub mod router;
pub mod services;
pub mod transport;

use std::future::Future;

use streamrelay_core::error::{RelayError, Result};
use tokio::net::TcpListener;

pub use app_state::AppState;
pub use config::GatewayConfig;

/// Serve the relay on an already-bound listener until `shutdown` resolves.
///
/// On shutdown the registry is put into draining mode and live connections are asked to close.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router::build_router(state.clone());
    let drain = state.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("shutdown requested; draining connections");
            drain.begin_drain();
        })
        .await
        .map_err(|e| RelayError::Internal(format!("server failed: {e}")))
}
