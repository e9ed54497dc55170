//! REST API client module for the Spider backend.
//!
//! This module provides the `ApiClient` for the authority check and token
//! verification (used by the session manager) and the raw lookup and
//! job-submit requests (used by the job gateway).
//!
//! The authority check relies on the browser session cookie; verification
//! and the `me` endpoint use the minted bearer token.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
