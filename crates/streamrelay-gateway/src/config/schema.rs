use serde::Deserialize;
use streamrelay_core::error::{RelayError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub reply: ReplySection,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: 1,
            gateway: GatewaySection::default(),
            reply: ReplySection::default(),
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(RelayError::UnsupportedVersion);
        }

        self.gateway.validate()?;
        self.reply.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Upgrade path prefix; the client id is the final path segment.
    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,

    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Frames above this size are refused with a notice (connection stays open).
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            route_prefix: default_route_prefix(),
            ping_interval_ms: default_ping_interval_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        let p = &self.route_prefix;
        if !p.starts_with('/') || p.len() < 2 || p.ends_with('/') {
            return Err(RelayError::BadRequest(
                "gateway.route_prefix must start with '/' and must not end with '/'".into(),
            ));
        }
        if p.contains(':') || p.contains('*') {
            return Err(RelayError::BadRequest(
                "gateway.route_prefix must not contain path parameters".into(),
            ));
        }
        if !(5000..=120000).contains(&self.ping_interval_ms) {
            return Err(RelayError::BadRequest(
                "gateway.ping_interval_ms must be between 5000 and 120000".into(),
            ));
        }
        if !(10000..=600000).contains(&self.idle_timeout_ms) {
            return Err(RelayError::BadRequest(
                "gateway.idle_timeout_ms must be between 10000 and 600000".into(),
            ));
        }
        if self.idle_timeout_ms <= self.ping_interval_ms {
            return Err(RelayError::BadRequest(
                "gateway.idle_timeout_ms must be greater than ping_interval_ms".into(),
            ));
        }
        if !(1024..=64 * 1024 * 1024).contains(&self.max_frame_bytes) {
            return Err(RelayError::BadRequest(
                "gateway.max_frame_bytes must be between 1KiB and 64MiB".into(),
            ));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_route_prefix() -> String {
    "/ws/ondemand".into()
}
fn default_ping_interval_ms() -> u64 {
    20000
}
fn default_idle_timeout_ms() -> u64 {
    60000
}
// 10MiB upload ceiling on the client plus room for metadata.
fn default_max_frame_bytes() -> usize {
    16 * 1024 * 1024
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplySection {
    /// Pause between streamed tokens.
    #[serde(default = "default_token_interval_ms")]
    pub token_interval_ms: u64,

    /// Requests held while a reply is streaming; beyond this the relay answers BUSY.
    #[serde(default = "default_max_queued_requests")]
    pub max_queued_requests: usize,
}

impl Default for ReplySection {
    fn default() -> Self {
        Self {
            token_interval_ms: default_token_interval_ms(),
            max_queued_requests: default_max_queued_requests(),
        }
    }
}

impl ReplySection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=5000).contains(&self.token_interval_ms) {
            return Err(RelayError::BadRequest(
                "reply.token_interval_ms must be between 1 and 5000".into(),
            ));
        }
        if self.max_queued_requests > 64 {
            return Err(RelayError::BadRequest(
                "reply.max_queued_requests must be at most 64".into(),
            ));
        }
        Ok(())
    }
}

fn default_token_interval_ms() -> u64 {
    50
}
fn default_max_queued_requests() -> usize {
    4
}
