//! Resilient API access layer for the Leadflow CRM
//!
//! This crate provides a single HTTP client for the Leadflow backend that
//! transparently handles the unreliable parts of talking to a remote service.
//!
//! # Features
//!
//! - **Response caching**: GETs are served from a bounded TTL + LRU cache
//! - **Token lifecycle**: bearer credentials with single-flight refresh on 401
//! - **Retry with exponential backoff**: transient failures only, bounded budget
//! - **Offline queue**: requests made while offline fail fast and are replayed
//!   when connectivity returns
//! - **Request correlation**: every request carries an `X-Request-ID`
//!
//! # Example
//!
//! ```rust,no_run
//! use leadflow_api_client::{ApiClient, ClientConfig, RequestConfig};
//! use serde_json::Value;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ApiClient::with_config(
//!         ClientConfig::default().with_base_url("https://api.leadflow.app/v1"),
//!     )?;
//!
//!     let leads = client
//!         .request::<Value>(RequestConfig::get("leads").with_query("status", "new"))
//!         .await?;
//!     println!("{} (cached: {})", leads.data, leads.cached);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod attempt;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod network;
pub mod queue;
pub mod request;

pub use auth::{AuthCoordinator, FileTokenStore, MemoryTokenStore, TokenPair, TokenStore};
pub use client::{ApiClient, ApiClientBuilder};
pub use config::ClientConfig;
pub use error::{ApiError, ApiResult, AuthError};
pub use executor::{HttpExecutor, Transport};
pub use network::NetworkStatus;
pub use queue::{DrainReport, PendingRequestQueue};
pub use request::{ApiResponse, HttpMethod, RequestConfig};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::auth::{TokenPair, TokenRefresher, TokenStore};
    pub use crate::client::ApiClient;
    pub use crate::config::ClientConfig;
    pub use crate::error::{ApiError, ApiResult};
    pub use crate::request::{ApiResponse, HttpMethod, RequestConfig};
}
