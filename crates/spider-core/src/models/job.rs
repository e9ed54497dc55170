//! Crawl job and domain lookup models.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A link found on the captured page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(default)]
pub struct PageLink {
    pub href: String,
    pub text: String,
    pub title: String,
}

/// An image found on the captured page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(default)]
pub struct PageImage {
    pub src: String,
    pub alt: String,
    pub title: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Serialized page content produced by the content script.
///
/// Only `html` is sent to the backend; the rest is kept with the job record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(default)]
pub struct DomSnapshot {
    pub html: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub domain: Option<String>,
    pub pathname: Option<String>,
    pub timestamp: Option<String>,
    pub meta: BTreeMap<String, String>,
    pub links: Vec<PageLink>,
    pub images: Vec<PageImage>,
}

/// Result of a successful (`201 Created`) job submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct JobSubmissionResult {
    #[serde(deserialize_with = "super::string_or_number")]
    pub run_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub total_score: Option<f64>,
    #[serde(default, deserialize_with = "super::opt_string_or_number")]
    pub data_id: Option<String>,
    /// Filled in by the gateway, not sent by the backend.
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub url: String,
}

/// Everything kept about a submitted job, stored under `crawl_{run_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct JobRecord {
    pub url: String,
    pub page_type: String,
    pub dom_snapshot: DomSnapshot,
    pub load_response: Value,
    pub timestamp: DateTime<Utc>,
}

impl JobRecord {
    pub fn storage_key(run_id: &str) -> String {
        format!("crawl_{}", run_id)
    }
}

/// Domain lookup outcome. A domain unknown to the backend is still a success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct LookupData {
    pub domain: String,
    pub exists: bool,
    pub message: String,
    /// Remaining fields of the backend payload, passed through untouched.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl LookupData {
    pub fn found(domain: &str, mut payload: Map<String, Value>) -> Self {
        // Our own fields take precedence over anything the backend echoes back.
        for key in ["domain", "exists", "message"] {
            payload.remove(key);
        }
        Self {
            domain: domain.to_string(),
            exists: true,
            message: format!("Domain '{}' found in database", domain),
            payload,
        }
    }

    pub fn not_found(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            exists: false,
            message: format!("Domain '{}' not found in database", domain),
            payload: Map::new(),
        }
    }
}
