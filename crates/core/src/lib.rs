//! Core building blocks for the Leadflow API access layer
//!
//! This crate holds the transport-independent pieces used by the client:
//!
//! - **Response cache**: bounded TTL + LRU cache with order-independent keys
//! - **Retry policy**: exponential backoff and status-based retry eligibility
//! - **Configuration**: `leadflow.toml` loading with environment overrides
//! - **Error handling**: coded errors with a context chain and user hints
//!
//! # Example
//!
//! ```rust,no_run
//! use leadflow_core::{cache::{CacheConfig, ResponseCache}, config::Config};
//!
//! let config = Config::load(None).expect("invalid configuration");
//! let cache: ResponseCache<String> = ResponseCache::new(CacheConfig {
//!     max_entries: config.schema.api.cache_max_size,
//!     ..CacheConfig::default()
//! });
//! assert!(cache.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod config;
pub mod duration_ms;
pub mod error;
pub mod retry;

pub use error::{Error, ErrorCategory, ErrorCode, Result, ResultExt};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::{cache_key, CacheConfig, CacheStats, ResponseCache};
    pub use crate::config::{ApiSettings, Config, ConfigSchema, TelemetrySettings};
    pub use crate::error::{Error, ErrorCategory, ErrorCode, Result, ResultExt};
    pub use crate::retry::RetryPolicy;
}
