//! Error types for the API client

use leadflow_core::retry::RetryPolicy;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Status code reported for network failures and offline rejections
pub const NETWORK_ERROR_STATUS: u16 = 0;

/// Status code reported for timeouts
pub const TIMEOUT_STATUS: u16 = 408;

/// API client errors
///
/// Every variant maps onto a status code via [`ApiError::status`], so callers
/// can branch on the predicates (`is_unauthorized`, `is_timeout`, ...) instead
/// of matching on messages.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    /// The request never produced an HTTP response (DNS, refused connection, reset)
    #[error("Network error: {0}")]
    Network(String),

    /// The attempt did not complete within its timeout
    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    /// The server answered with a non-2xx status
    #[error("API error ({status}): {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Server-supplied message, or the status line text
        message: String,
        /// Response body, if there was one
        body: Option<Value>,
    },

    /// The device is offline; the request was not sent
    #[error("Device is offline; request queued for replay")]
    Offline {
        /// ID of the queue entry holding the request, if it was queued
        queued_id: Option<Uuid>,
    },

    /// A successful response body could not be decoded into the requested type
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The request could not be built (bad URL, header or body)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// Create an HTTP response error without a body
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
            body: None,
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Status code following the client convention:
    /// `0` for network/offline, `408` for timeouts, the HTTP status otherwise.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::Http { status, .. } => *status,
            Self::Timeout(_) => TIMEOUT_STATUS,
            Self::Network(_)
            | Self::Offline { .. }
            | Self::Decode(_)
            | Self::InvalidRequest(_)
            | Self::Config(_) => NETWORK_ERROR_STATUS,
        }
    }

    /// Response body attached to an HTTP error
    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        match self {
            Self::Http { body, .. } => body.as_ref(),
            _ => None,
        }
    }

    /// Network-level failure or offline rejection (status 0)
    #[must_use]
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Offline { .. })
    }

    /// The attempt timed out (status 408)
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// The request was rejected because the device is offline
    #[must_use]
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Offline { .. })
    }

    /// Check if this is a server error (5xx)
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status() >= 500
    }

    /// Check if this is a client error (4xx)
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }

    /// Check if the server rejected the credentials (401)
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Http { status: 401, .. })
    }

    /// Whether another attempt of the same request may succeed under `policy`
    #[must_use]
    pub fn is_retryable(&self, policy: &RetryPolicy) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Http { status, .. } => policy.is_retryable_status(*status),
            Self::Offline { .. } | Self::Decode(_) | Self::InvalidRequest(_) | Self::Config(_) => {
                false
            }
        }
    }
}

/// Token lifecycle errors
///
/// Cloneable so every caller waiting on a shared refresh receives the same failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// There is no refresh token to exchange
    #[error("No refresh token available")]
    NoRefreshToken,

    /// The auth server refused the refresh token
    #[error("Token refresh rejected ({status}): {message}")]
    Rejected {
        /// HTTP status returned by the refresh endpoint
        status: u16,
        /// Server-supplied message
        message: String,
    },

    /// The refresh call failed before the server could answer
    #[error("Token refresh failed: {0}")]
    Transport(String),

    /// The refresh endpoint answered with something that isn't a token pair
    #[error("Malformed token response: {0}")]
    InvalidResponse(String),

    /// A login or logout happened while the exchange was running; its result was discarded
    #[error("Credentials changed during token refresh")]
    Superseded,
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Http {
                status, message, ..
            } => Self::Rejected { status, message },
            ApiError::Decode(msg) => Self::InvalidResponse(msg),
            other => Self::Transport(other.to_string()),
        }
    }
}
