//! Configuration for the Leadflow API client
//!
//! Built from the `[api]` table of `leadflow.toml` plus `LEADFLOW_*`
//! environment overrides, or assembled directly with the builder methods.

use crate::error::{ApiError, ApiResult};
use leadflow_core::cache::CacheConfig;
use leadflow_core::config::{ApiSettings, Config};
use leadflow_core::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Request target prefix
    pub base_url: String,
    /// Per-attempt timeout
    #[serde(with = "leadflow_core::duration_ms")]
    pub timeout: Duration,
    /// Retry budget, backoff, and retry-eligible statuses
    pub retry: RetryPolicy,
    /// Response cache sizing
    pub cache: CacheConfig,
    /// Capacity of the offline queue
    pub offline_queue_max: usize,
    /// Path of the token refresh endpoint, relative to `base_url`
    pub refresh_path: String,
    /// Credentials file; platform data dir when unset
    pub token_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_settings(&ApiSettings::default())
    }
}

impl ClientConfig {
    /// Build from the `[api]` settings table
    #[must_use]
    pub fn from_settings(settings: &ApiSettings) -> Self {
        let retry = RetryPolicy {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.retry_delay_ms),
            retry_status_codes: settings.retry_status_codes.iter().copied().collect(),
        };

        Self {
            base_url: settings.base_url.clone(),
            timeout: Duration::from_millis(settings.timeout_ms),
            retry,
            cache: CacheConfig {
                max_entries: settings.cache_max_size,
                default_ttl: Duration::from_millis(settings.cache_ttl_ms),
            },
            offline_queue_max: settings.offline_queue_max,
            refresh_path: settings.refresh_path.clone(),
            token_file: settings.token_file.clone(),
        }
    }

    /// Load from a config file (or the standard locations) with environment
    /// overrides applied
    pub fn load(path: Option<&str>) -> ApiResult<Self> {
        let config = Config::load(path).map_err(|e| ApiError::config(e.to_string()))?;
        Ok(Self::from_settings(&config.schema.api))
    }

    /// Create configuration from defaults and `LEADFLOW_*` environment variables
    ///
    /// Reads `LEADFLOW_API_URL`, `LEADFLOW_TIMEOUT_MS`, `LEADFLOW_MAX_RETRIES`,
    /// `LEADFLOW_RETRY_DELAY_MS`, `LEADFLOW_CACHE_TTL_MS`,
    /// `LEADFLOW_CACHE_MAX_SIZE` and `LEADFLOW_OFFLINE_QUEUE_MAX`.
    pub fn from_env() -> ApiResult<Self> {
        let mut schema = Config::defaults().schema;
        leadflow_core::config::apply_overrides(&mut schema, |key| std::env::var(key).ok())
            .map_err(|e| ApiError::config(e.to_string()))?;
        Ok(Self::from_settings(&schema.api))
    }

    /// Builder-style method to set base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Builder-style method to set timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder-style method to set the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Builder-style method to set the retry budget
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    /// Builder-style method to set cache sizing
    #[must_use]
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Builder-style method to set the offline queue capacity
    #[must_use]
    pub fn with_offline_queue_max(mut self, max: usize) -> Self {
        self.offline_queue_max = max;
        self
    }

    /// Builder-style method to set the refresh endpoint path
    #[must_use]
    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    /// Builder-style method to set the credentials file
    #[must_use]
    pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_file = Some(path.into());
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> ApiResult<()> {
        if self.base_url.is_empty() {
            return Err(ApiError::config("base_url cannot be empty"));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ApiError::config("base_url must start with http:// or https://"));
        }

        if self.timeout.is_zero() {
            return Err(ApiError::config("timeout cannot be zero"));
        }

        if self.cache.max_entries == 0 {
            return Err(ApiError::config("cache_max_size cannot be zero"));
        }

        if self.offline_queue_max == 0 {
            return Err(ApiError::config("offline_queue_max cannot be zero"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_delay, Duration::from_millis(1000));
        assert!(config.retry.is_retryable_status(429));
        assert!(!config.retry.is_retryable_status(501));
        assert_eq!(config.cache.max_entries, 100);
        assert_eq!(config.cache.default_ttl, Duration::from_secs(60));
        assert_eq!(config.offline_queue_max, 50);
        assert_eq!(config.refresh_path, "auth/refresh");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_settings() {
        let settings = ApiSettings {
            base_url: "https://crm.example.com/api".into(),
            timeout_ms: 2_500,
            max_retries: 1,
            retry_status_codes: vec![503],
            ..ApiSettings::default()
        };

        let config = ClientConfig::from_settings(&settings);
        assert_eq!(config.base_url, "https://crm.example.com/api");
        assert_eq!(config.timeout, Duration::from_millis(2_500));
        assert_eq!(config.retry.max_retries, 1);
        assert!(config.retry.is_retryable_status(503));
        assert!(!config.retry.is_retryable_status(502));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[api]\nbase_url = \"https://crm.example.com\"\ncache_max_size = 5"
        )
        .unwrap();

        let config = ClientConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.cache.max_entries, 5);
        assert_eq!(config.offline_queue_max, 50);
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = ClientConfig::load(Some("/nonexistent/leadflow.toml")).unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[test]
    fn test_builder_pattern() {
        let config = ClientConfig::default()
            .with_base_url("https://crm.example.com/api")
            .with_timeout(Duration::from_secs(30))
            .with_max_retries(5)
            .with_offline_queue_max(10);

        assert_eq!(config.base_url, "https://crm.example.com/api");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.offline_queue_max, 10);
    }

    #[test]
    fn test_validation() {
        assert!(ClientConfig::default().with_base_url("").validate().is_err());
        assert!(
            ClientConfig::default()
                .with_base_url("ftp://crm.example.com")
                .validate()
                .is_err()
        );
        assert!(
            ClientConfig::default()
                .with_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            ClientConfig::default()
                .with_offline_queue_max(0)
                .validate()
                .is_err()
        );
    }
}
