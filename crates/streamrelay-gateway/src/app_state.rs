//! Shared application state for the streamrelay gateway.
//!
//! Wires the client registry, the reply streamer (with its agent), and metrics. Startup errors
//! are explicit (Result instead of panic).

use std::sync::Arc;
use std::time::Duration;

use streamrelay_core::error::Result;

use crate::config::GatewayConfig;
use crate::obs::GatewayMetrics;
use crate::realtime::ClientRegistry;
use crate::services::{EchoAgent, ReplyAgent, ReplyStreamer};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    registry: Arc<ClientRegistry>,
    streamer: Arc<ReplyStreamer>,
    metrics: Arc<GatewayMetrics>,
}

struct AppStateInner {
    cfg: GatewayConfig,
}

impl AppState {
    /// Build application state with the placeholder echo agent.
    pub fn new(cfg: GatewayConfig) -> Result<Self> {
        Self::with_agent(cfg, Arc::new(EchoAgent::new()))
    }

    /// Build application state around a specific reply agent.
    pub fn with_agent(cfg: GatewayConfig, agent: Arc<dyn ReplyAgent>) -> Result<Self> {
        cfg.validate()?;

        let interval = Duration::from_millis(cfg.reply.token_interval_ms);
        let streamer = Arc::new(ReplyStreamer::new(agent, interval));
        tracing::info!(
            agent = streamer.agent_name(),
            token_interval_ms = cfg.reply.token_interval_ms,
            max_queued_requests = cfg.reply.max_queued_requests,
            "reply pipeline ready"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner { cfg }),
            registry: Arc::new(ClientRegistry::new()),
            streamer,
            metrics: Arc::new(GatewayMetrics::default()),
        })
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn registry(&self) -> Arc<ClientRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn streamer(&self) -> Arc<ReplyStreamer> {
        Arc::clone(&self.streamer)
    }

    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn is_draining(&self) -> bool {
        self.registry.is_draining()
    }

    /// Stop accepting upgrades and ask live connections to close.
    pub fn begin_drain(&self) {
        self.registry.set_draining();
        self.registry.close_all();
    }
}
