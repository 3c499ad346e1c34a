//! Session records captured before chatting, keyed by activity.
//!
//! Records live under `qrSession:v2:activity:{id}`. Older clients wrote
//! `qrSession:activity:{id}`; a lookup that only finds the legacy key migrates it
//! (read old, write new, delete old).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use streamrelay_core::error::{RelayError, Result};

use crate::storage::KeyValueStore;

const KEY_PREFIX: &str = "qrSession:v2:activity:";
const LEGACY_KEY_PREFIX: &str = "qrSession:activity:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Human-readable address, when one was resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub name: String,
    pub email: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl UserSession {
    /// JSON object sent as `user_meta` with every request. Same shape as the stored record.
    pub fn user_meta(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "session record not encodable");
            Value::Null
        })
    }

    /// First word of the name, used in the greeting.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

pub fn session_key(activity_id: &str) -> String {
    format!("{KEY_PREFIX}{activity_id}")
}

pub fn legacy_session_key(activity_id: &str) -> String {
    format!("{LEGACY_KEY_PREFIX}{activity_id}")
}

pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn load(&self, activity_id: &str) -> Result<Option<UserSession>> {
        if activity_id.trim().is_empty() {
            return Ok(None);
        }
        let key = session_key(activity_id);
        if let Some(raw) = self.store.get(&key)? {
            return Ok(parse(&key, &raw));
        }

        let legacy = legacy_session_key(activity_id);
        let Some(raw) = self.store.get(&legacy)? else {
            return Ok(None);
        };
        let Some(session) = parse(&legacy, &raw) else {
            return Ok(None);
        };
        self.store.set(&key, &raw)?;
        self.store.remove(&legacy)?;
        tracing::info!(activity_id, "migrated session record to versioned key");
        Ok(Some(session))
    }

    pub fn save(&self, activity_id: &str, session: &UserSession) -> Result<()> {
        if activity_id.trim().is_empty() {
            return Err(RelayError::BadRequest("activity id is required".into()));
        }
        let raw = serde_json::to_string(session)
            .map_err(|e| RelayError::Storage(format!("encode session failed: {e}")))?;
        self.store.set(&session_key(activity_id), &raw)
    }

    /// Remove the record under both the current and the legacy key.
    pub fn clear(&self, activity_id: &str) -> Result<()> {
        self.store.remove(&session_key(activity_id))?;
        self.store.remove(&legacy_session_key(activity_id))
    }

    /// `user_meta` for requests; `None` when there is no readable record.
    pub fn user_meta(&self, activity_id: &str) -> Option<Value> {
        match self.load(activity_id) {
            Ok(s) => s.map(|s| s.user_meta()),
            Err(e) => {
                tracing::warn!(error = %e, activity_id, "session record unavailable");
                None
            }
        }
    }
}

fn parse(key: &str, raw: &str) -> Option<UserSession> {
    match serde_json::from_str(raw) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::warn!(key, error = %e, "ignoring unreadable session record");
            None
        }
    }
}
