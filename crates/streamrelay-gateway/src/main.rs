//! streamrelay gateway binary.
//!
//! - WebSocket endpoint: {route_prefix}/:client_id (default /ws/ondemand/:client_id)
//! - Config: STREAMRELAY_CONFIG, else ./streamrelay.yaml, else built-in defaults
//! - Graceful shutdown on Ctrl+C / SIGTERM

use std::net::SocketAddr;

use streamrelay_core::error::{RelayError, Result};
use tracing_subscriber::{fmt, EnvFilter};

use streamrelay_gateway::{app_state::AppState, config};

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "streamrelay-gateway failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cfg = config::load_from_env()?;
    let listen: SocketAddr = cfg.gateway.listen.parse().map_err(|e| {
        RelayError::BadRequest(format!("gateway.listen must be a valid SocketAddr: {e}"))
    })?;
    let route_prefix = cfg.gateway.route_prefix.clone();

    let state = AppState::new(cfg)?;
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| RelayError::Internal(format!("failed to bind {listen}: {e}")))?;

    tracing::info!(%listen, %route_prefix, "streamrelay-gateway starting");
    streamrelay_gateway::serve(listener, state, shutdown_signal()).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("signal received, starting graceful shutdown");
}
