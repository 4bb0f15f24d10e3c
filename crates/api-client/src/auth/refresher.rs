//! HTTP token refresh endpoint

use super::coordinator::TokenRefresher;
use super::store::TokenPair;
use crate::error::AuthError;
use crate::executor::Transport;
use crate::request::{build_url, HttpMethod, HttpRequest};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Shape of the refresh endpoint's answer
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(alias = "accessToken")]
    access_token: String,
    /// Some servers rotate the refresh token, some don't
    #[serde(default, alias = "refreshToken")]
    refresh_token: Option<String>,
}

/// Refreshes tokens by POSTing `{"refresh_token": ...}` to the auth endpoint.
///
/// Goes straight to the [`Transport`], never through the client, so a rejected
/// refresh can't recurse into another refresh.
pub struct HttpTokenRefresher {
    transport: Arc<dyn Transport>,
    base_url: String,
    refresh_path: String,
    timeout: Duration,
}

impl HttpTokenRefresher {
    /// Create a refresher for `base_url` + `refresh_path`
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        refresh_path: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            refresh_path: refresh_path.into(),
            timeout,
        }
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let url = build_url(&self.base_url, &self.refresh_path, &[])?;
        let request = HttpRequest {
            method: HttpMethod::Post,
            url,
            headers: BTreeMap::from([
                ("Accept".to_string(), "application/json".to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ]),
            body: Some(json!({ "refresh_token": refresh_token })),
            timeout: self.timeout,
        };

        let response = self.transport.execute(request).await?;
        let parsed: RefreshResponse = serde_json::from_value(response.data)
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

        Ok(TokenPair {
            access_token: parsed.access_token,
            refresh_token: parsed
                .refresh_token
                .unwrap_or_else(|| refresh_token.to_string()),
        })
    }
}
