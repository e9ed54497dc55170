//! Inbound command routing.
//!
//! Each UI command is one variant of [`Command`], tagged by `action` on the
//! wire, and produces exactly one [`Response`]. Failures are returned as
//! [`Response::Failure`]; nothing propagates past the router.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::{AuthOutcome, AuthSession, SessionError, SessionManager};
use crate::gateway::{ErrorDetail, GatewayError, JobGateway};
use crate::models::{DomSnapshot, JobRecord, JobSubmissionResult, LookupData, VerifyResponse};

fn default_force() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    GetState,
    Refresh {
        #[serde(default = "default_force")]
        force: bool,
    },
    Login,
    Logout,
    Verify {
        #[serde(default)]
        token: Option<String>,
    },
    DomainLookup {
        domain: String,
    },
    CrawlJob {
        url: String,
        #[serde(rename = "pageType")]
        page_type: String,
        #[serde(rename = "domSnapshot", alias = "domContent")]
        dom_snapshot: DomSnapshot,
    },
    GetJob {
        #[serde(rename = "runId")]
        run_id: String,
    },
}

impl Command {
    pub fn action(&self) -> &'static str {
        match self {
            Command::GetState => "getState",
            Command::Refresh { .. } => "refresh",
            Command::Login => "login",
            Command::Logout => "logout",
            Command::Verify { .. } => "verify",
            Command::DomainLookup { .. } => "domainLookup",
            Command::CrawlJob { .. } => "crawlJob",
            Command::GetJob { .. } => "getJob",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Response {
    State {
        state: AuthSession,
    },
    Auth {
        authenticated: bool,
        state: AuthSession,
    },
    LoggedOut {
        state: AuthSession,
    },
    Verify {
        verify: VerifyResponse,
    },
    Lookup {
        data: LookupData,
    },
    Job {
        data: JobSubmissionResult,
    },
    JobRecord {
        record: Option<JobRecord>,
    },
    Failure {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<ErrorDetail>,
    },
}

impl Response {
    pub fn failure(error: impl Into<String>) -> Self {
        Response::Failure {
            error: error.into(),
            detail: None,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Response::Failure { .. })
    }
}

impl From<AuthOutcome> for Response {
    fn from(outcome: AuthOutcome) -> Self {
        Response::Auth {
            authenticated: outcome.is_authenticated(),
            state: outcome.into_state(),
        }
    }
}

fn gateway_failure(context: &str, err: GatewayError) -> Response {
    match err {
        GatewayError::Rejected { message, detail } => Response::Failure {
            error: message,
            detail: Some(*detail),
        },
        GatewayError::Transport(e) => Response::failure(format!("{}: {}", context, e)),
    }
}

/// Dispatches commands to the session manager and the job gateway.
#[derive(Clone)]
pub struct Router {
    session: SessionManager,
    gateway: Arc<JobGateway>,
}

impl Router {
    pub fn new(session: SessionManager, gateway: Arc<JobGateway>) -> Self {
        Self { session, gateway }
    }

    /// Parse a raw command and dispatch it.
    pub async fn dispatch_value(&self, value: Value) -> Response {
        match serde_json::from_value::<Command>(value) {
            Ok(command) => self.dispatch(command).await,
            Err(e) => {
                warn!(error = %e, "Rejected unknown or malformed command");
                Response::failure("Unknown action")
            }
        }
    }

    pub async fn dispatch(&self, command: Command) -> Response {
        debug!(action = command.action(), "Dispatching command");
        match command {
            Command::GetState => Response::State {
                state: self.session.state(),
            },
            Command::Refresh { force } => match self.session.authenticate(force).await {
                Ok(outcome) => outcome.into(),
                Err(e) => Response::failure(e.to_string()),
            },
            Command::Login => match self.session.login().await {
                Ok(outcome) => outcome.into(),
                Err(e) => Response::failure(e.to_string()),
            },
            Command::Logout => Response::LoggedOut {
                state: self.session.logout().await,
            },
            Command::Verify { token } => match self.session.verify(token).await {
                Ok(verify) => Response::Verify { verify },
                Err(SessionError::NoToken) => Response::failure(SessionError::NoToken.to_string()),
                // Verification problems are reported, not treated as command failures.
                Err(e) => Response::Verify {
                    verify: VerifyResponse::failed(e.to_string()),
                },
            },
            Command::DomainLookup { domain } => match self.gateway.domain_lookup(&domain).await {
                Ok(data) => Response::Lookup { data },
                Err(e) => gateway_failure("Domain lookup failed", e),
            },
            Command::CrawlJob {
                url,
                page_type,
                dom_snapshot,
            } => match self
                .gateway
                .submit_crawl_job(&url, &page_type, &dom_snapshot)
                .await
            {
                Ok(data) => Response::Job { data },
                Err(e) => gateway_failure("Page load failed", e),
            },
            Command::GetJob { run_id } => Response::JobRecord {
                record: self.gateway.job(&run_id).await,
            },
        }
    }
}
