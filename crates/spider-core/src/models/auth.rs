use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::User;

/// Lifetime assumed when an authenticated response carries no expiry at all.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

/// Expiry as sent by the backend: an ISO-8601 string or epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ExpiresAt {
    Iso(String),
    EpochMillis(i64),
}

impl ExpiresAt {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            ExpiresAt::Iso(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            ExpiresAt::EpochMillis(ms) => Utc.timestamp_millis_opt(*ms).single(),
        }
    }
}

/// Response of the authority check (`GET /api/extension/auth`).
#[derive(Debug, Clone, Deserialize)]
pub struct AuthStatus {
    #[serde(default)]
    pub authenticated: bool,
    pub token: Option<String>,
    pub user: Option<User>,
    #[serde(rename = "expiresAt")]
    pub expires_at: Option<ExpiresAt>,
    #[serde(rename = "ttlSeconds")]
    pub ttl_seconds: Option<i64>,
}

impl AuthStatus {
    /// Normalize the reported expiry to an absolute timestamp.
    ///
    /// An absolute `expiresAt` wins over `ttlSeconds`; a missing,
    /// non-positive or unrepresentable TTL falls back to
    /// [`DEFAULT_TOKEN_TTL_SECS`].
    pub fn resolve_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        if let Some(at) = self.expires_at.as_ref().and_then(ExpiresAt::to_datetime) {
            return at;
        }
        self.ttl_seconds
            .filter(|ttl| *ttl > 0)
            .and_then(Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or_else(|| now + Duration::seconds(DEFAULT_TOKEN_TTL_SECS))
    }
}

/// Response of `POST /api/extension/verify`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct VerifyResponse {
    #[serde(default)]
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VerifyResponse {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            extra: Map::new(),
        }
    }
}
