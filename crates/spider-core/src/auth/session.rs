use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::User;

/// A token closer than this to expiry is treated as already expired.
const TOKEN_VALIDITY_MARGIN_SECS: i64 = 10;

/// Snapshot of the signed-in session.
///
/// `expires_at` is only meaningful while `token` is set, and
/// `last_verified_at` is only stamped after a verify call succeeded
/// against the token currently held.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AuthSession {
    pub token: Option<String>,
    #[serde(rename = "expiresAt")]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: Option<User>,
    #[serde(rename = "lastVerifiedAt")]
    pub last_verified_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    /// Time left before the token expires, if an expiry is known.
    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at.map(|expires| expires - now)
    }

    /// True while a token is held and more than 10s remain before it expires.
    pub fn is_token_valid(&self, now: DateTime<Utc>) -> bool {
        self.token.is_some()
            && self
                .time_until_expiry(now)
                .map(|left| left > Duration::seconds(TOKEN_VALIDITY_MARGIN_SECS))
                .unwrap_or(false)
    }

    pub fn is_signed_in(&self) -> bool {
        self.token.is_some()
    }

    fn apply(&mut self, patch: SessionPatch) {
        if let Some(token) = patch.token {
            // A stamp belongs to the token it was earned by.
            if token != self.token {
                self.last_verified_at = None;
            }
            self.token = token;
        }
        if let Some(expires_at) = patch.expires_at {
            self.expires_at = expires_at;
        }
        if let Some(user) = patch.user {
            self.user = user;
        }
        if let Some(last_verified_at) = patch.last_verified_at {
            self.last_verified_at = last_verified_at;
        }
    }

    pub(crate) fn merged(&self, patch: SessionPatch) -> Self {
        let mut next = self.clone();
        next.apply(patch);
        next
    }
}

/// Partial update merged into the session. An outer `None` leaves the field
/// untouched; `Some(None)` sets it to null.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub token: Option<Option<String>>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub user: Option<Option<User>>,
    pub last_verified_at: Option<Option<DateTime<Utc>>>,
}

impl SessionPatch {
    /// Fields written after a successful authority check.
    pub fn authenticated(
        token: Option<String>,
        user: Option<User>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token: Some(token),
            user: Some(user),
            expires_at: Some(Some(expires_at)),
            last_verified_at: None,
        }
    }

    pub fn verified_at(at: DateTime<Utc>) -> Self {
        Self {
            last_verified_at: Some(Some(at)),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_expiring_in(secs: i64, now: DateTime<Utc>) -> AuthSession {
        AuthSession {
            token: Some("tok".to_string()),
            expires_at: Some(now + Duration::seconds(secs)),
            ..AuthSession::default()
        }
    }

    #[test]
    fn test_token_validity_boundary() {
        let now = Utc::now();
        assert!(session_expiring_in(30, now).is_token_valid(now));
        assert!(session_expiring_in(11, now).is_token_valid(now));
        // Flips exactly at the 10s margin.
        assert!(!session_expiring_in(10, now).is_token_valid(now));
        assert!(!session_expiring_in(-5, now).is_token_valid(now));

        let just_over = AuthSession {
            token: Some("tok".to_string()),
            expires_at: Some(now + Duration::milliseconds(10_001)),
            ..AuthSession::default()
        };
        assert!(just_over.is_token_valid(now));
    }

    #[test]
    fn test_token_required_for_validity() {
        let now = Utc::now();
        let mut session = session_expiring_in(3600, now);
        session.token = None;
        assert!(!session.is_token_valid(now));

        let no_expiry = AuthSession {
            token: Some("tok".to_string()),
            ..AuthSession::default()
        };
        assert!(!no_expiry.is_token_valid(now));
    }

    #[test]
    fn test_patch_merges_only_present_fields() {
        let now = Utc::now();
        let base = AuthSession {
            token: Some("tok".to_string()),
            expires_at: Some(now),
            user: Some(User {
                email: Some("a@b.test".to_string()),
                ..User::default()
            }),
            last_verified_at: None,
        };

        let stamped = base.merged(SessionPatch::verified_at(now));
        assert_eq!(stamped.token, base.token);
        assert_eq!(stamped.user, base.user);
        assert_eq!(stamped.last_verified_at, Some(now));

        let new_user = stamped.merged(SessionPatch {
            user: Some(None),
            ..SessionPatch::default()
        });
        assert_eq!(new_user.user, None);
        assert_eq!(new_user.token, base.token);
        assert_eq!(new_user.last_verified_at, Some(now));

        let cleared_token = stamped.merged(SessionPatch {
            token: Some(None),
            ..SessionPatch::default()
        });
        assert_eq!(cleared_token.token, None);
        assert_eq!(cleared_token.last_verified_at, None);
    }

    #[test]
    fn test_new_token_drops_verification_stamp() {
        let now = Utc::now();
        let verified = AuthSession {
            token: Some("old".to_string()),
            expires_at: Some(now),
            user: None,
            last_verified_at: Some(now),
        };

        let same = verified.merged(SessionPatch::authenticated(
            Some("old".to_string()),
            None,
            now + Duration::hours(1),
        ));
        assert_eq!(same.last_verified_at, Some(now));

        let rotated = verified.merged(SessionPatch::authenticated(
            Some("new".to_string()),
            None,
            now + Duration::hours(1),
        ));
        assert_eq!(rotated.token.as_deref(), Some("new"));
        assert_eq!(rotated.last_verified_at, None);
    }

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_value(AuthSession::default()).unwrap();
        assert!(json.get("expiresAt").is_some());
        assert!(json.get("lastVerifiedAt").is_some());
        assert_eq!(json["token"], serde_json::Value::Null);
    }
}
