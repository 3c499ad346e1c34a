//! Gateway config loader (strict parsing).

pub mod schema;

use std::fs;
use std::io::ErrorKind;

use streamrelay_core::error::{RelayError, Result};

pub use schema::{GatewayConfig, GatewaySection, ReplySection};

/// Env var naming the config file.
pub const CONFIG_ENV: &str = "STREAMRELAY_CONFIG";
/// Config file used when `STREAMRELAY_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "streamrelay.yaml";

pub fn load_from_file(path: &str) -> Result<GatewayConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| RelayError::Internal(format!("read config failed ({path}): {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<GatewayConfig> {
    let cfg: GatewayConfig = serde_yaml::from_str(s)
        .map_err(|e| RelayError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load from `STREAMRELAY_CONFIG`, or from `streamrelay.yaml` if present, else built-in defaults.
///
/// An explicitly named file must exist.
pub fn load_from_env() -> Result<GatewayConfig> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return load_from_file(&path);
    }
    match fs::read_to_string(DEFAULT_CONFIG_PATH) {
        Ok(s) => load_from_str(&s),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!(path = DEFAULT_CONFIG_PATH, "no config file; using defaults");
            let cfg = GatewayConfig::default();
            cfg.validate()?;
            Ok(cfg)
        }
        Err(e) => Err(RelayError::Internal(format!(
            "read config failed ({DEFAULT_CONFIG_PATH}): {e}"
        ))),
    }
}
