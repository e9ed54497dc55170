//! Session lifecycle: keeping the extension signed in against the backend.
//!
//! This module provides:
//! - `AuthSession`: the persisted session snapshot and its validity rules
//! - `AuthStateStore`: the in-memory mirror that persists and broadcasts
//! - `SessionManager`: authority checks, proactive refresh, backoff,
//!   interactive login polling and logout
//!
//! The authority check is the only call that can invalidate a session.
//! Token verification is informational.

pub mod backoff;
pub mod broadcast;
pub mod error;
pub mod manager;
pub mod session;
pub mod store;

pub use backoff::Backoff;
pub use broadcast::{PublishOutcome, StateBroadcaster};
pub use error::SessionError;
pub use manager::{AuthOutcome, Capabilities, SessionManager, SurfaceUrls};
pub use session::{AuthSession, SessionPatch};
pub use store::AuthStateStore;

use async_trait::async_trait;

use crate::api::ApiError;
use crate::models::{AuthStatus, VerifyResponse};

/// Name of the single wake-up used for both proactive refresh and backoff retries.
pub const REFRESH_ALARM: &str = "refresh-token";

/// The backend calls the session manager depends on.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// The authority check, carrying session-cookie credentials.
    async fn check_session(&self) -> Result<AuthStatus, ApiError>;

    async fn verify_token(&self, token: &str) -> Result<VerifyResponse, ApiError>;
}
