//! Activity validity status as reported by the relay host.

use serde_json::Value;

/// Validity of an activity (event) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityStatus {
    Active,
    NotActive,
    Invalid,
}

impl ActivityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityStatus::Active => "active",
            ActivityStatus::NotActive => "not_active",
            ActivityStatus::Invalid => "invalid",
        }
    }

    /// Parse a status string; anything unrecognised is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ActivityStatus::Active),
            "not_active" => Some(ActivityStatus::NotActive),
            "invalid" => Some(ActivityStatus::Invalid),
            _ => None,
        }
    }

    /// Read the status from a response body.
    ///
    /// `status` is preferred; the legacy `detail` field carries the same enum. A missing or
    /// unrecognised value is `Invalid`.
    pub fn from_response_body(body: &Value) -> Self {
        ["status", "detail"]
            .iter()
            .find_map(|k| body.get(*k).filter(|v| !v.is_null()))
            .and_then(Value::as_str)
            .and_then(Self::parse)
            .unwrap_or(ActivityStatus::Invalid)
    }
}
