use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Pick the most useful text out of an error body: its `error` or
    /// `message` field when it is JSON, otherwise the (truncated) body.
    fn describe_body(status: reqwest::StatusCode, body: &str) -> String {
        let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
        let field = |name: &str| {
            parsed
                .as_ref()
                .and_then(|v| v.get(name))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        field("error")
            .or_else(|| field("message"))
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    format!("HTTP {}", status.as_u16())
                } else {
                    Self::truncate_body(body)
                }
            })
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let description = Self::describe_body(status, body);
        match status.as_u16() {
            401 => ApiError::Unauthorized(description),
            403 => ApiError::AccessDenied(description),
            404 => ApiError::NotFound(description),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(description),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, description)),
        }
    }
}
