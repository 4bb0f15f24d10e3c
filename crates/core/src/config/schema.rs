//! Configuration schema definitions
//!
//! Mirrors the `leadflow.toml` layout:
//!
//! ```toml
//! [api]
//! base_url = "https://api.leadflow.app/v1"
//! timeout_ms = 10000
//! max_retries = 3
//!
//! [telemetry]
//! log_level = "debug"
//! json = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::cache::{CACHE_MAX_SIZE, CACHE_TTL_MS};
use crate::retry::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_MS, DEFAULT_RETRY_STATUS_CODES};

/// Root configuration schema
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ConfigSchema {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

/// API access layer settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiSettings {
    /// Request target prefix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-attempt timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retries after the initial attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay in milliseconds, doubled per attempt
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Statuses eligible for retry
    #[serde(default = "default_retry_status_codes")]
    pub retry_status_codes: Vec<u16>,

    /// Response cache TTL in milliseconds
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// Maximum number of cached responses
    #[serde(default = "default_cache_max_size")]
    pub cache_max_size: usize,

    /// Maximum number of requests held while offline
    #[serde(default = "default_offline_queue_max")]
    pub offline_queue_max: usize,

    /// Path (relative to `base_url`) of the token refresh endpoint
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    /// Where persisted credentials live; platform data dir when unset
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            retry_status_codes: default_retry_status_codes(),
            cache_ttl_ms: default_cache_ttl_ms(),
            cache_max_size: default_cache_max_size(),
            offline_queue_max: default_offline_queue_max(),
            refresh_path: default_refresh_path(),
            token_file: None,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_retry_status_codes() -> Vec<u16> {
    DEFAULT_RETRY_STATUS_CODES.to_vec()
}

fn default_cache_ttl_ms() -> u64 {
    CACHE_TTL_MS
}

fn default_cache_max_size() -> usize {
    CACHE_MAX_SIZE
}

fn default_offline_queue_max() -> usize {
    50
}

fn default_refresh_path() -> String {
    "auth/refresh".to_string()
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySettings {
    /// Fallback filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Include the event target in log lines
    #[serde(default)]
    pub show_target: bool,

    /// Emit one JSON object per log line
    #[serde(default)]
    pub json: bool,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            show_target: false,
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
