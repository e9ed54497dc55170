//! Host configuration management.
//!
//! This module handles loading the host configuration: the backend origin,
//! the endpoint paths the extension talks to, and where state is persisted.
//!
//! Configuration is stored at `~/.config/spider-host/config.json`. The
//! `SPIDER_BASE_URL` and `SPIDER_DATA_DIR` environment variables override
//! the file.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "spider-host";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Backend origin used when nothing else is configured (no trailing slash)
const DEFAULT_BASE_URL: &str = "https://app.neissetrak.ovh";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const BASE_URL_ENV: &str = "SPIDER_BASE_URL";
const DATA_DIR_ENV: &str = "SPIDER_DATA_DIR";

/// Endpoint and UI paths on the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub auth: String,
    pub verify: String,
    pub me: String,
    pub sign_in: String,
    pub sign_out: String,
    pub domain_lookup: String,
    pub job_submit: String,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            auth: "/api/extension/auth".to_string(),
            verify: "/api/extension/verify".to_string(),
            me: "/api/extension/me".to_string(),
            sign_in: "/api/auth/signin".to_string(),
            sign_out: "/api/auth/signout".to_string(),
            domain_lookup: "/spider/domain-lookup".to_string(),
            job_submit: "/spider/load".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub paths: Paths,
    pub request_timeout_secs: u64,
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            paths: Paths::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            data_dir: None,
        }
    }
}

impl Config {
    /// Load the config file (defaults when absent), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };

        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            config.base_url = base_url;
        }
        if let Ok(data_dir) = std::env::var(DATA_DIR_ENV) {
            config.data_dir = Some(PathBuf::from(data_dir));
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject base URLs the HTTP layer cannot use and strip a trailing slash.
    pub fn validate(&mut self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            bail!("base_url must be a valid http(s) URL, got '{}'", self.base_url);
        }
        while self.base_url.ends_with('/') {
            self.base_url.pop();
        }
        Ok(())
    }

    /// Join the backend origin with a path.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the persisted session and job records.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Directory for rotated log files.
    pub fn log_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("logs"))
    }
}
