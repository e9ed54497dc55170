//! API client for communicating with the Spider backend.
//!
//! This module provides the `ApiClient` struct used for the cookie-backed
//! authority check, bearer-token verification, and the raw domain lookup
//! and job submission requests that the job gateway interprets.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;

use super::ApiError;
use crate::auth::AuthBackend;
use crate::config::Config;
use crate::models::{AuthStatus, VerifyResponse};

/// Body of `POST /spider/load`.
#[derive(Debug, Clone, Serialize)]
pub struct JobPayload<'a> {
    pub url: &'a str,
    pub page_type: &'a str,
    pub dom: &'a str,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    token: &'a str,
}

/// API client for the Spider backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    config: Arc<Config>,
}

impl ApiClient {
    /// Create a new API client. The cookie store carries the browser-style
    /// session cookie the authority check depends on.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            config: Arc::new(config.clone()),
        })
    }

    /// Authority check: `GET /api/extension/auth` with session cookies.
    pub async fn check_session(&self) -> Result<AuthStatus, ApiError> {
        let url = self.config.url(&self.config.paths.auth);
        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        Self::read_json(response, "authority check").await
    }

    /// `POST /api/extension/verify` with `{token}`.
    pub async fn verify_token(&self, token: &str) -> Result<VerifyResponse, ApiError> {
        let url = self.config.url(&self.config.paths.verify);
        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(&VerifyRequest { token })
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        Self::read_json(response, "verify").await
    }

    /// `GET /api/extension/me` with the bearer token.
    pub async fn me_with_bearer(&self, token: &str) -> Result<Value, ApiError> {
        let url = self.config.url(&self.config.paths.me);
        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .bearer_auth(token)
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        Self::read_json(response, "me").await
    }

    /// `GET /spider/domain-lookup?domain=...`. Status handling is left to the caller.
    pub async fn lookup_domain(&self, domain: &str) -> Result<Response, ApiError> {
        let url = self.config.url(&self.config.paths.domain_lookup);
        debug!(domain = domain, "Domain lookup");
        Ok(self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .query(&[("domain", domain)])
            .send()
            .await?)
    }

    /// `POST /spider/load`. Status handling is left to the caller.
    pub async fn submit_job(&self, payload: &JobPayload<'_>) -> Result<Response, ApiError> {
        let url = self.config.url(&self.config.paths.job_submit);
        debug!(url = payload.url, page_type = payload.page_type, "Submitting crawl job");
        Ok(self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(payload)
            .send()
            .await?)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {} response: {}", what, e)))
    }
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn check_session(&self) -> Result<AuthStatus, ApiError> {
        ApiClient::check_session(self).await
    }

    async fn verify_token(&self, token: &str) -> Result<VerifyResponse, ApiError> {
        ApiClient::verify_token(self, token).await
    }
}
