//! Tap configuration
//!
//! This module contains the typed configuration loaded from the JSON config
//! file passed on the command line: Marketo endpoints, OAuth credentials, and
//! the knobs for the export download and polling loops.

use crate::error::{Error, Result};
use crate::types::OptionStringExt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use url::Url;

/// Default export download chunk size: 5 MiB
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

// ============================================================================
// Config
// ============================================================================

/// Complete tap configuration loaded from JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Marketo REST base URL (e.g. `https://123-ABC-456.mktorest.com/`)
    pub endpoint: String,

    /// Identity service base URL; derived from `endpoint` when absent
    #[serde(default)]
    pub identity: Option<String>,

    /// OAuth2 client id
    pub client_id: String,

    /// OAuth2 client secret
    pub client_secret: String,

    /// Fallback replication start for streams with no bookmark yet
    pub start_date: DateTime<Utc>,

    /// Size of each ranged export download request, in bytes
    #[serde(default = "default_chunk_size")]
    pub export_chunk_size: u64,

    /// Seconds between export status polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,

    /// Seconds before an unfinished export job is abandoned
    #[serde(default = "default_job_timeout")]
    pub job_timeout_seconds: u64,

    /// Max retries for transient HTTP failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Requests allowed per rate-limit window
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests: u32,

    /// Rate-limit window length in seconds
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_seconds: u64,

    /// Whether the account has Corona (incremental lead export) support
    #[serde(default)]
    pub use_corona: bool,

    /// Optional User-Agent header sent with every request
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

fn default_poll_interval() -> u64 {
    30
}

fn default_job_timeout() -> u64 {
    3600
}

fn default_max_retries() -> u32 {
    3
}

fn default_rate_limit_requests() -> u32 {
    // Marketo's documented budget is 100 calls per 20 seconds.
    100
}

fn default_rate_limit_window() -> u64 {
    20
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| Error::config(format!("Failed to read config file: {e}")))?;
        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("Invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(Error::missing_field("endpoint"));
        }
        Url::parse(&self.endpoint).map_err(|e| Error::InvalidConfigValue {
            field: "endpoint".to_string(),
            message: e.to_string(),
        })?;
        if let Some(identity) = &self.identity {
            Url::parse(identity).map_err(|e| Error::InvalidConfigValue {
                field: "identity".to_string(),
                message: e.to_string(),
            })?;
        }
        if self.client_id.is_empty() {
            return Err(Error::missing_field("client_id"));
        }
        if self.client_secret.is_empty() {
            return Err(Error::missing_field("client_secret"));
        }
        if self.export_chunk_size == 0 {
            return Err(Error::InvalidConfigValue {
                field: "export_chunk_size".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// The identity base URL, derived from the REST endpoint when not set
    pub fn identity_endpoint(&self) -> String {
        match self.identity.clone().none_if_empty() {
            Some(identity) => identity,
            None => format!("{}/identity", self.endpoint.trim_end_matches('/')),
        }
    }
}
