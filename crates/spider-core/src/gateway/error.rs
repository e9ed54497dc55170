//! Structured error decoding shared by lookup and job submission.
//!
//! An error response may describe itself through headers, a JSON body, or
//! both. The decoded [`ErrorDetail`] keeps every piece so the UI can offer
//! follow-up actions (status page, report link) without the gateway knowing
//! anything about rendering.

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::api::ApiError;

pub const HEADER_USER_MESSAGE: &str = "x-user-message";
pub const HEADER_ERROR_CODE: &str = "x-error-code";
pub const HEADER_CORRELATION_ID: &str = "x-correlation-id";
pub const HEADER_RUN_ID: &str = "x-run-id";
pub const HEADER_STATUS_URL: &str = "x-status-url";
pub const HEADER_REPORT_URL: &str = "x-report-url";

/// Everything known about a failed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: Option<String>,
    /// Message supplied by the server, before any fallback.
    pub user_message: Option<String>,
    pub correlation_id: Option<String>,
    pub status_url: Option<String>,
    pub report_url: Option<String>,
    pub http_status: u16,
    /// Parsed JSON body, or null when the body was empty or not JSON.
    pub raw_body: Value,
}

#[derive(Error, Debug)]
pub enum GatewayError {
    /// The backend answered with a status we treat as failure.
    #[error("{message}")]
    Rejected {
        message: String,
        detail: Box<ErrorDetail>,
    },

    #[error("Request failed: {0}")]
    Transport(#[from] ApiError),
}

impl GatewayError {
    pub fn detail(&self) -> Option<&ErrorDetail> {
        match self {
            GatewayError::Rejected { detail, .. } => Some(&**detail),
            GatewayError::Transport(_) => None,
        }
    }

    /// Decode a failed response: headers, then body, then the status itself.
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let headers = response.headers().clone();
        // An unreadable body is treated like an empty one.
        let body = response.bytes().await.unwrap_or_default();
        decode_error(status, &headers, &body)
    }
}

/// Build the error for a failed response.
///
/// Message priority: `X-User-Message` header, `body.user_message`,
/// `body.message`, `body.detail.user_message`, `body.detail.message`,
/// then `HTTP {status}`.
pub fn decode_error(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> GatewayError {
    let raw_body: Value = serde_json::from_slice(body).unwrap_or(Value::Null);

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let body_str = |path: &[&str]| {
        let mut node = &raw_body;
        for key in path {
            node = node.get(key)?;
        }
        node.as_str().filter(|s| !s.is_empty()).map(str::to_string)
    };

    let header_message = header(HEADER_USER_MESSAGE);
    let body_user_message = body_str(&["user_message"]);

    let message = header_message
        .clone()
        .or_else(|| body_user_message.clone())
        .or_else(|| body_str(&["message"]))
        .or_else(|| body_str(&["detail", "user_message"]))
        .or_else(|| body_str(&["detail", "message"]))
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    let detail = ErrorDetail {
        code: header(HEADER_ERROR_CODE)
            .or_else(|| body_str(&["code"]))
            .or_else(|| body_str(&["detail", "code"])),
        user_message: header_message
            .or(body_user_message)
            .or_else(|| body_str(&["detail", "user_message"])),
        correlation_id: header(HEADER_CORRELATION_ID)
            .or_else(|| header(HEADER_RUN_ID))
            .or_else(|| body_str(&["correlation_id"])),
        status_url: header(HEADER_STATUS_URL),
        report_url: header(HEADER_REPORT_URL),
        http_status: status.as_u16(),
        raw_body,
    };

    GatewayError::Rejected {
        message,
        detail: Box::new(detail),
    }
}
