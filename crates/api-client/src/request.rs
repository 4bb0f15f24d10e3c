//! Request and response types

use crate::error::{ApiError, ApiResult};
use leadflow_core::cache::cache_key;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// HTTP methods supported by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Upper-case method name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Self::GET,
            HttpMethod::Post => Self::POST,
            HttpMethod::Put => Self::PUT,
            HttpMethod::Patch => Self::PATCH,
            HttpMethod::Delete => Self::DELETE,
        }
    }
}

/// Everything needed to issue one logical request.
///
/// Built per call and consumed by [`ApiClient::request`](crate::ApiClient::request).
#[derive(Debug, Clone, PartialEq)]
pub struct RequestConfig {
    /// Endpoint path relative to the base URL
    pub path: String,
    /// HTTP method
    pub method: HttpMethod,
    /// JSON body
    pub body: Option<Value>,
    /// Query parameters; `null` values are omitted from the URL
    pub query: BTreeMap<String, Value>,
    /// Extra headers
    pub headers: BTreeMap<String, String>,
    /// Per-attempt timeout; client default when unset
    pub timeout: Option<Duration>,
    /// Retries after the initial attempt; client default when unset
    pub retries: Option<u32>,
    /// Never attach credentials or trigger a token refresh
    pub skip_auth: bool,
    /// Neither read from nor write to the response cache
    pub skip_cache: bool,
}

impl RequestConfig {
    /// Create a request for `method` on `path`
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            body: None,
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            timeout: None,
            retries: None,
            skip_auth: false,
            skip_cache: false,
        }
    }

    /// GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// POST request
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    /// PUT request
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    /// PATCH request
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    /// DELETE request
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Builder-style method to set a JSON body
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Builder-style method to serialize a body
    pub fn with_json<B: Serialize + ?Sized>(self, body: &B) -> ApiResult<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::invalid_request(format!("body is not serializable: {e}")))?;
        Ok(self.with_body(value))
    }

    /// Builder-style method to add a query parameter
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Builder-style method to add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Builder-style method to set the per-attempt timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builder-style method to set the retry budget
    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Builder-style method to send without credentials
    #[must_use]
    pub fn skip_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }

    /// Builder-style method to bypass the response cache
    #[must_use]
    pub fn skip_cache(mut self) -> Self {
        self.skip_cache = true;
        self
    }

    /// Query parameters as strings, `null` values dropped
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| {
                let rendered = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), rendered)
            })
            .collect()
    }

    /// Whether the response may be served from and stored in the cache
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        self.method == HttpMethod::Get && !self.skip_cache
    }

    /// Cache key for cacheable requests
    #[must_use]
    pub fn cache_key(&self) -> Option<String> {
        self.is_cacheable()
            .then(|| cache_key(&self.path, self.query_pairs()))
    }
}

/// Join `base` and `path` and append the encoded query pairs.
pub fn build_url(base: &str, path: &str, query: &[(String, String)]) -> ApiResult<Url> {
    let joined = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    let mut url =
        Url::parse(&joined).map_err(|e| ApiError::invalid_request(format!("{joined}: {e}")))?;

    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }

    Ok(url)
}

/// One attempt as handed to a [`Transport`](crate::executor::Transport)
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Fully built target URL
    pub url: Url,
    /// Headers to send
    pub headers: BTreeMap<String, String>,
    /// JSON body
    pub body: Option<Value>,
    /// Hard deadline for the attempt
    pub timeout: Duration,
}

/// Successful response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    /// Decoded payload (`null` for 204)
    pub data: T,
    /// HTTP status
    pub status: u16,
    /// Response headers (lower-case names)
    pub headers: BTreeMap<String, String>,
    /// Whether this came from the response cache
    pub cached: bool,
}

impl ApiResponse<Value> {
    /// Decode the JSON payload into `T`
    pub fn decode<T: DeserializeOwned>(self) -> ApiResult<ApiResponse<T>> {
        let data = serde_json::from_value(self.data).map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(ApiResponse {
            data,
            status: self.status,
            headers: self.headers,
            cached: self.cached,
        })
    }
}
