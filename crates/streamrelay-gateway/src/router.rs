//! Axum router wiring (HTTP -> WS upgrade).
//!
//! `{route_prefix}/:client_id` upgrades to the relay session; ops endpoints sit alongside.

use axum::{routing::get, Router};

use crate::{app_state::AppState, ops, transport};

pub fn build_router(state: AppState) -> Router {
    let ws_route = format!("{}/:client_id", state.cfg().gateway.route_prefix);
    Router::new()
        .route(&ws_route, get(transport::ws::ws_upgrade))
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/metrics", get(ops::metrics))
        .with_state(state)
}
