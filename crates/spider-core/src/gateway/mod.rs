//! Job gateway: domain lookup and crawl job submission.
//!
//! Both calls share the structured error decoding in [`error`]. Nothing
//! here is retried automatically; failures go back to the caller with the
//! decoded message and detail.

pub mod error;

pub use error::{decode_error, ErrorDetail, GatewayError};

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::api::client::JobPayload;
use crate::api::{ApiClient, ApiError};
use crate::clock::Clock;
use crate::models::{DomSnapshot, JobRecord, JobSubmissionResult, LookupData};
use crate::storage::Storage;

pub struct JobGateway {
    api: ApiClient,
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
}

impl JobGateway {
    pub fn new(api: ApiClient, storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        Self {
            api,
            storage,
            clock,
        }
    }

    /// Look a domain up. A 404 means "not in the database" and is a success.
    pub async fn domain_lookup(&self, domain: &str) -> Result<LookupData, GatewayError> {
        let response = self.api.lookup_domain(domain).await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            debug!(domain = domain, "Domain not found");
            return Ok(LookupData::not_found(domain));
        }
        if !status.is_success() {
            let err = GatewayError::from_response(response).await;
            warn!(domain = domain, status = status.as_u16(), error = %err, "Domain lookup failed");
            return Err(err);
        }

        let text = response.text().await.map_err(ApiError::from)?;
        let payload = if text.trim().is_empty() {
            Map::new()
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => map,
                _ => {
                    return Err(ApiError::InvalidResponse(
                        "Domain lookup response is not a JSON object".to_string(),
                    )
                    .into())
                }
            }
        };
        Ok(LookupData::found(domain, payload))
    }

    /// Submit a crawl job. Only `201 Created` counts as success; the job
    /// record is stored under its run id before the result is returned.
    pub async fn submit_crawl_job(
        &self,
        url: &str,
        page_type: &str,
        snapshot: &DomSnapshot,
    ) -> Result<JobSubmissionResult, GatewayError> {
        let payload = JobPayload {
            url,
            page_type,
            dom: &snapshot.html,
        };
        let response = self.api.submit_job(&payload).await?;
        let status = response.status();

        if status != StatusCode::CREATED {
            let err = GatewayError::from_response(response).await;
            warn!(url = url, status = status.as_u16(), error = %err, "Crawl job rejected");
            return Err(err);
        }

        let load_response: Value = response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse job submission response: {}", e))
        })?;
        let mut result: JobSubmissionResult = serde_json::from_value(load_response.clone())
            .map_err(|e| ApiError::InvalidResponse(format!("Job submission response: {}", e)))?;
        result.message = format!("Page load initiated for {}", page_type);
        result.url = url.to_string();

        let record = JobRecord {
            url: url.to_string(),
            page_type: page_type.to_string(),
            dom_snapshot: snapshot.clone(),
            load_response,
            timestamp: self.clock.now(),
        };
        self.store_job(&result.run_id, &record).await;

        info!(run_id = %result.run_id, page_type = page_type, "Crawl job submitted");
        Ok(result)
    }

    /// Fetch a stored job record. Unreadable records are logged and reported missing.
    pub async fn job(&self, run_id: &str) -> Option<JobRecord> {
        let key = JobRecord::storage_key(run_id);
        match self.storage.get(&key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(run_id = run_id, error = %e, "Ignoring malformed job record");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(run_id = run_id, error = %e, "Failed to read job record");
                None
            }
        }
    }

    async fn store_job(&self, run_id: &str, record: &JobRecord) {
        let value = match serde_json::to_value(record) {
            Ok(value) => value,
            Err(e) => {
                warn!(run_id = run_id, error = %e, "Failed to serialize job record");
                return;
            }
        };
        if let Err(e) = self
            .storage
            .set(vec![(JobRecord::storage_key(run_id), value)])
            .await
        {
            warn!(run_id = run_id, error = %e, "Failed to store job record");
        }
    }
}
