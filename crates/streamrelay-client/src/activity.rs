//! Activity id resolution and the validity check against the relay's HTTP API.

use std::time::Duration;

use serde_json::Value;

use streamrelay_core::activity::ActivityStatus;
use streamrelay_core::error::{RelayError, Result};

use crate::config::ClientConfig;
use crate::storage::KeyValueStore;

/// Storage key remembering the last activity id seen.
pub const ACTIVITY_KEY: &str = "activity_id";

const CHECK_PATH: &str = "/v1/check_activity_validity";
const CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Pick the activity id: a non-blank query value wins and is remembered, otherwise the
/// remembered value, otherwise empty.
pub fn resolve_activity_id(store: &dyn KeyValueStore, query: Option<&str>) -> String {
    if let Some(q) = query.filter(|q| !q.trim().is_empty()) {
        if let Err(e) = store.set(ACTIVITY_KEY, q) {
            tracing::debug!(error = %e, "could not remember activity id");
        }
        return q.to_string();
    }
    match store.get(ACTIVITY_KEY) {
        Ok(Some(stored)) if !stored.trim().is_empty() => stored,
        Ok(_) => String::new(),
        Err(e) => {
            tracing::debug!(error = %e, "could not read activity id");
            String::new()
        }
    }
}

/// Client for `POST /v1/check_activity_validity?activity={id}`.
#[derive(Debug, Clone)]
pub struct ActivityChecker {
    http: reqwest::Client,
    base: String,
}

impl ActivityChecker {
    /// `base` is `scheme://host[:port]` with no trailing slash.
    pub fn new(base: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(CHECK_TIMEOUT)
            .build()
            .map_err(|e| RelayError::Internal(format!("http client init failed: {e}")))?;
        Ok(Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(cfg: &ClientConfig) -> Result<Self> {
        Self::new(cfg.http_base())
    }

    /// Never fails: anything other than a 2xx with a recognised status reads as `Invalid`.
    pub async fn check(&self, activity_id: &str) -> ActivityStatus {
        let id = activity_id.trim();
        if id.is_empty() {
            return ActivityStatus::Invalid;
        }
        match self.fetch(id).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(activity_id = id, error = %e, "activity check failed");
                ActivityStatus::Invalid
            }
        }
    }

    async fn fetch(&self, id: &str) -> Result<ActivityStatus> {
        let url = format!("{}{CHECK_PATH}", self.base);
        let res = self
            .http
            .post(&url)
            .query(&[("activity", id)])
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            return Err(RelayError::NotAllowed(format!("check returned {status}")));
        }
        let body: Value = res
            .json()
            .await
            .map_err(|e| RelayError::MalformedFrame(format!("bad check response: {e}")))?;
        let parsed = ActivityStatus::from_response_body(&body);
        tracing::debug!(activity_id = id, status = parsed.as_str(), "activity checked");
        Ok(parsed)
    }
}
