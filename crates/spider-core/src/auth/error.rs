use thiserror::Error;

use crate::api::ApiError;

/// Failures of session operations.
///
/// An explicit "not authenticated" answer from the authority check is not
/// an error; it is [`super::AuthOutcome::Unauthenticated`].
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Auth request failed: {0}")]
    Transport(#[from] ApiError),

    #[error("Verify failed: {0}")]
    VerificationFailed(String),

    #[error("Login timed out")]
    LoginTimeout,

    #[error("No token to verify")]
    NoToken,
}
