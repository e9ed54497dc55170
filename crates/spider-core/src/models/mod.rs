//! Data models exchanged with the backend and the extension UI.
//!
//! - `User`: the signed-in account as reported by the authority check
//! - `AuthStatus`, `VerifyResponse`: authority-check and verify payloads
//! - `DomSnapshot`, `JobRecord`, `JobSubmissionResult`, `LookupData`:
//!   crawl job and domain lookup types

pub mod auth;
pub mod job;
pub mod user;

pub use auth::{AuthStatus, ExpiresAt, VerifyResponse};
pub use job::{DomSnapshot, JobRecord, JobSubmissionResult, LookupData};
pub use user::User;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accept an identifier sent either as a JSON string or a JSON number.
pub(crate) fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Required variant of [`opt_string_or_number`].
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    opt_string_or_number(deserializer)?
        .ok_or_else(|| serde::de::Error::custom("expected a string or number identifier"))
}
