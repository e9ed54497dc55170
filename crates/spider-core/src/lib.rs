//! Spider Core - background coordination for the Spider browser extension.
//!
//! This crate contains the platform-independent pieces:
//! - `auth`: session lifecycle, persisted auth state and its broadcast
//! - `gateway`: domain lookup and crawl job submission
//! - `router`: the inbound command surface used by the UI
//! - `api`, `storage`, `alarms`, `surface`, `clock`: injected capabilities
//!
//! A host (see the `spider-host` crate) wires concrete capabilities together
//! and feeds lifecycle events and commands in.

pub mod alarms;
pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod events;
pub mod gateway;
pub mod models;
pub mod router;
pub mod storage;
pub mod surface;

#[cfg(test)]
mod test_support;

pub use alarms::{Alarms, TokioAlarms};
pub use api::{ApiClient, ApiError};
pub use auth::{
    AuthOutcome, AuthSession, Capabilities, SessionError, SessionManager, StateBroadcaster,
    SurfaceUrls, REFRESH_ALARM,
};
pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use events::{EventKind, EventRegistry, LifecycleEvent};
pub use gateway::{ErrorDetail, GatewayError, JobGateway};
pub use router::{Command, Response, Router};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
pub use surface::Surface;
