//! Single-attempt HTTP execution
//!
//! A [`Transport`] performs exactly one call: no retries, no auth, no caching.
//! [`HttpExecutor`] is the reqwest-backed implementation; tests substitute
//! in-memory fakes.

use crate::error::{ApiError, ApiResult};
use crate::request::{ApiResponse, HttpRequest};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::trace;

/// Body fields checked, in order, for a server-supplied error message
const ERROR_MESSAGE_FIELDS: [&str; 3] = ["detail", "message", "error"];

/// Performs one HTTP call and classifies the outcome
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute `request`, honouring its timeout.
    ///
    /// Non-2xx statuses come back as [`ApiError::Http`], expired deadlines as
    /// [`ApiError::Timeout`] and connection-level failures as [`ApiError::Network`].
    async fn execute(&self, request: HttpRequest) -> ApiResult<ApiResponse<Value>>;
}

/// reqwest-backed [`Transport`]
#[derive(Clone)]
pub struct HttpExecutor {
    inner: Client,
}

impl HttpExecutor {
    /// Create an executor with the default user agent
    pub fn new() -> ApiResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("leadflow-api-client/", env!("CARGO_PKG_VERSION"))),
        );

        let inner = Client::builder()
            .default_headers(default_headers)
            .build()
            .map_err(|e| ApiError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { inner })
    }

    /// Wrap an existing reqwest client
    #[must_use]
    pub fn with_client(inner: Client) -> Self {
        Self { inner }
    }

    async fn send(&self, request: HttpRequest) -> ApiResult<ApiResponse<Value>> {
        let mut builder = self.inner.request(request.method.into(), request.url);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify_reqwest_error)?;
        let status = response.status();
        let headers = collect_headers(response.headers());

        if status == StatusCode::NO_CONTENT {
            return Ok(ApiResponse {
                data: Value::Null,
                status: status.as_u16(),
                headers,
                cached: false,
            });
        }

        let bytes = response.bytes().await.map_err(classify_reqwest_error)?;
        let body = parse_body(&bytes);

        if status.is_success() {
            Ok(ApiResponse {
                data: body.unwrap_or(Value::Null),
                status: status.as_u16(),
                headers,
                cached: false,
            })
        } else {
            let message = error_message(body.as_ref(), status);
            Err(ApiError::Http {
                status: status.as_u16(),
                message,
                body,
            })
        }
    }
}

#[async_trait]
impl Transport for HttpExecutor {
    async fn execute(&self, request: HttpRequest) -> ApiResult<ApiResponse<Value>> {
        let timeout = request.timeout;
        trace!(method = %request.method, url = %request.url, "Executing request");

        // Dropping the send future on expiry aborts the in-flight call
        match tokio::time::timeout(timeout, self.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout(timeout)),
        }
    }
}

/// Map a reqwest failure onto the client taxonomy
fn classify_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_builder() {
        ApiError::invalid_request(err.to_string())
    } else if err.is_decode() {
        ApiError::Decode(err.to_string())
    } else {
        ApiError::Network(err.to_string())
    }
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

/// JSON when possible, raw text otherwise, `None` for an empty body
fn parse_body(bytes: &[u8]) -> Option<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    serde_json::from_slice(bytes)
        .ok()
        .or_else(|| Some(Value::String(String::from_utf8_lossy(bytes).into_owned())))
}

/// Pick the server's message from `detail`, `message` or `error`, falling back
/// to the status line text.
fn error_message(body: Option<&Value>, status: StatusCode) -> String {
    let from_body = body.and_then(Value::as_object).and_then(|object| {
        ERROR_MESSAGE_FIELDS
            .iter()
            .filter_map(|field| object.get(*field))
            .find(|value| !value.is_null())
            .map(|value| match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    });

    from_body.unwrap_or_else(|| {
        status
            .canonical_reason()
            .map_or_else(|| format!("HTTP {}", status.as_u16()), ToString::to_string)
    })
}
