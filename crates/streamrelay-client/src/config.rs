//! Client configuration.
//!
//! Every field has a default so an empty document (or no document at all) is valid. The agent
//! host can be overridden per deployment through `STREAMRELAY_AGENT_HOST`.

use std::time::Duration;

use serde::Deserialize;
use streamrelay_core::error::{RelayError, Result};

use crate::backoff::RetryPolicy;

/// Env var overriding [`ClientConfig::agent_host`].
pub const AGENT_HOST_ENV: &str = "STREAMRELAY_AGENT_HOST";
/// Development host used when nothing else is configured.
pub const DEFAULT_AGENT_HOST: &str = "localhost:8080";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// `host[:port]` of the relay, without scheme.
    pub agent_host: String,
    /// Use `wss`/`https` instead of `ws`/`http`.
    pub secure: bool,
    pub route_prefix: String,
    pub retry: RetrySection,
    /// Attachment ceiling enforced before anything is sent.
    pub max_upload_bytes: usize,
    pub render: RenderSection,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            agent_host: DEFAULT_AGENT_HOST.to_string(),
            secure: false,
            route_prefix: "/ws/ondemand".to_string(),
            retry: RetrySection::default(),
            max_upload_bytes: 10 * 1024 * 1024,
            render: RenderSection::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults, with the agent host taken from the environment when set.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let mut cfg: Self = serde_json::from_str(s)
            .map_err(|e| RelayError::BadRequest(format!("invalid client config: {e}")))?;
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(host) = std::env::var(AGENT_HOST_ENV) {
            let host = host.trim();
            if !host.is_empty() {
                self.agent_host = host.to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.agent_host.trim().is_empty() || self.agent_host.contains("://") {
            return Err(RelayError::BadRequest(
                "agent_host must be host[:port] without a scheme".into(),
            ));
        }
        if !self.route_prefix.starts_with('/') || self.route_prefix.ends_with('/') {
            return Err(RelayError::BadRequest(
                "route_prefix must start with '/' and must not end with '/'".into(),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(RelayError::BadRequest("max_upload_bytes must be > 0".into()));
        }
        self.retry.validate()
    }

    /// `ws[s]://{agent_host}{route_prefix}/{client_id}`
    pub fn ws_url(&self, client_id: &str) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{scheme}://{}{}/{client_id}", self.agent_host, self.route_prefix)
    }

    /// `http[s]://{agent_host}`
    pub fn http_base(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{scheme}://{}", self.agent_host)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySection {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 8000,
            max_attempts: 7,
        }
    }
}

impl RetrySection {
    pub fn validate(&self) -> Result<()> {
        if self.base_delay_ms == 0 || self.max_delay_ms < self.base_delay_ms {
            return Err(RelayError::BadRequest(
                "retry delays must satisfy 0 < base_delay_ms <= max_delay_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_attempts: self.max_attempts,
        }
    }
}

/// Reply rendering cadence.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSection {
    /// Delay before the first queued token is rendered.
    pub schedule_ms: u64,
    /// Delay between subsequent tokens.
    pub drain_ms: u64,
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            schedule_ms: 10,
            drain_ms: 20,
        }
    }
}

impl RenderSection {
    pub fn schedule(&self) -> Duration {
        Duration::from_millis(self.schedule_ms)
    }

    pub fn drain(&self) -> Duration {
        Duration::from_millis(self.drain_ms)
    }
}
