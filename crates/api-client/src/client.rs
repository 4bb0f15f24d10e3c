//! Main API client implementation

use crate::attempt::{after_failure, AttemptState, FailureContext};
use crate::auth::{
    AuthCoordinator, FileTokenStore, HttpTokenRefresher, MemoryTokenStore, TokenPair,
    TokenRefresher, TokenStore,
};
use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};
use crate::executor::{HttpExecutor, Transport};
use crate::network::NetworkStatus;
use crate::queue::{DrainReport, PendingRequestQueue};
use crate::request::{build_url, ApiResponse, HttpRequest, RequestConfig};
use leadflow_core::cache::{CacheStats, ResponseCache};
use leadflow_telemetry::{metrics, Timer};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Request correlation ID header
const X_REQUEST_ID: &str = "X-Request-ID";

const JSON: &str = "application/json";

/// Leadflow API client with built-in resilience patterns
///
/// Every request goes through the same pipeline:
/// - GETs are served from the response cache while fresh
/// - Requests made while offline are queued and fail fast
/// - Bearer credentials are attached, and renewed once on a 401
/// - Transient failures are retried with exponential backoff
/// - Successful GETs are written through to the cache
///
/// Clones share the cache, credentials, queue, and connectivity status.
#[derive(Clone)]
pub struct ApiClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    auth: Arc<AuthCoordinator>,
    cache: Arc<ResponseCache<ApiResponse<Value>>>,
    queue: Arc<PendingRequestQueue>,
    network: NetworkStatus,
}

/// Assembles an [`ApiClient`] from its collaborators
pub struct ApiClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    token_store: Option<Arc<dyn TokenStore>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    network: Option<NetworkStatus>,
}

impl ApiClientBuilder {
    /// Use `transport` instead of the reqwest executor
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Persist credentials in `store` (in-memory by default)
    #[must_use]
    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.token_store = Some(store);
        self
    }

    /// Persist credentials in the configured `token_file`, or the platform
    /// data dir when none is configured
    #[must_use]
    pub fn file_token_store(self) -> Self {
        let store = match &self.config.token_file {
            Some(path) => FileTokenStore::new(path),
            None => FileTokenStore::default_location(),
        };
        self.token_store(Arc::new(store))
    }

    /// Renew credentials through `refresher` instead of the refresh endpoint
    #[must_use]
    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Share an existing connectivity status
    #[must_use]
    pub fn network(mut self, network: NetworkStatus) -> Self {
        self.network = Some(network);
        self
    }

    /// Validate the configuration and build the client
    pub fn build(self) -> ApiResult<ApiClient> {
        self.config.validate()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpExecutor::new()?),
        };
        let store = self
            .token_store
            .unwrap_or_else(|| Arc::new(MemoryTokenStore::new()));
        let refresher = self.refresher.unwrap_or_else(|| {
            Arc::new(HttpTokenRefresher::new(
                Arc::clone(&transport),
                self.config.base_url.clone(),
                self.config.refresh_path.clone(),
                self.config.timeout,
            ))
        });

        Ok(ApiClient {
            cache: Arc::new(ResponseCache::new(self.config.cache.clone())),
            queue: Arc::new(PendingRequestQueue::new(self.config.offline_queue_max)),
            auth: Arc::new(AuthCoordinator::new(store, refresher)),
            network: self.network.unwrap_or_default(),
            transport,
            config: Arc::new(self.config),
        })
    }
}

impl ApiClient {
    /// Create a client with configuration from `leadflow.toml` and the environment
    pub fn new() -> ApiResult<Self> {
        let config = ClientConfig::load(None)?;
        Self::with_config(config)
    }

    /// Create a client with specific configuration and default collaborators
    pub fn with_config(config: ClientConfig) -> ApiResult<Self> {
        Self::builder(config).build()
    }

    /// Start building a client
    #[must_use]
    pub fn builder(config: ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder {
            config,
            transport: None,
            token_store: None,
            refresher: None,
            network: None,
        }
    }

    /// Get the current configuration
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Credential coordinator
    #[must_use]
    pub fn auth(&self) -> &AuthCoordinator {
        &self.auth
    }

    /// Connectivity status driving the offline queue
    #[must_use]
    pub fn network(&self) -> &NetworkStatus {
        &self.network
    }

    /// Requests deferred while offline
    #[must_use]
    pub fn queue(&self) -> &PendingRequestQueue {
        &self.queue
    }

    // -------------------------------------------------------------------------
    // Request pipeline
    // -------------------------------------------------------------------------

    /// Issue `config` and decode the payload into `T`
    pub async fn request<T: DeserializeOwned>(
        &self,
        config: RequestConfig,
    ) -> ApiResult<ApiResponse<T>> {
        self.request_value(config).await?.decode()
    }

    /// Issue `config` and return the raw JSON payload
    #[instrument(skip(self, config), fields(method = %config.method, path = %config.path))]
    pub async fn request_value(&self, config: RequestConfig) -> ApiResult<ApiResponse<Value>> {
        if let Some(key) = config.cache_key() {
            if let Some(mut hit) = self.cache.get(&key) {
                metrics().increment("api.cache.hit");
                debug!(key = %key, "Serving from cache");
                hit.cached = true;
                return Ok(hit);
            }
            metrics().increment("api.cache.miss");
        }

        if !self.network.is_online() {
            let queued_id = self.queue.enqueue(config);
            metrics().increment("api.queued");
            warn!(id = %queued_id, "Offline; request queued");
            return Err(ApiError::Offline {
                queued_id: Some(queued_id),
            });
        }

        self.fetch(&config).await
    }

    /// Dispatch and write successful GETs through to the cache
    async fn fetch(&self, config: &RequestConfig) -> ApiResult<ApiResponse<Value>> {
        let response = self.dispatch(config).await?;
        if let Some(key) = config.cache_key() {
            self.cache.set(&key, response.clone(), None);
        }
        Ok(response)
    }

    /// Drive the attempt state machine for one logical request
    async fn dispatch(&self, config: &RequestConfig) -> ApiResult<ApiResponse<Value>> {
        let request_id = Uuid::new_v4().to_string();
        let url = build_url(&self.config.base_url, &config.path, &config.query_pairs())?;
        let timeout = config.timeout.unwrap_or(self.config.timeout);
        let max_retries = config.retries.unwrap_or(self.config.retry.max_retries);
        let mut refreshed = false;

        let mut state = AttemptState::Attempting { attempt: 0 };
        loop {
            state = match state {
                AttemptState::Attempting { attempt } => {
                    let request = HttpRequest {
                        method: config.method,
                        url: url.clone(),
                        headers: self.headers(config, &request_id),
                        body: config.body.clone(),
                        timeout,
                    };

                    metrics().increment("api.attempts");
                    let timer = Timer::start("api.request.latency_ms");
                    let result = self.transport.execute(request).await;
                    let elapsed = timer.stop();

                    match result {
                        Ok(response) => {
                            debug!(
                                request_id = %request_id,
                                attempt = attempt + 1,
                                status = response.status,
                                elapsed_ms = elapsed.as_millis(),
                                "Request succeeded"
                            );
                            AttemptState::Succeeded(response)
                        }
                        Err(err) => {
                            debug!(
                                request_id = %request_id,
                                attempt = attempt + 1,
                                status = err.status(),
                                error = %err,
                                "Attempt failed"
                            );
                            let ctx = FailureContext {
                                attempt,
                                max_retries,
                                can_refresh: !config.skip_auth && !refreshed,
                            };
                            after_failure(err, ctx, &self.config.retry)
                        }
                    }
                }

                AttemptState::Refreshing { attempt, error } => {
                    refreshed = true;
                    metrics().increment("api.refreshes");
                    match self.auth.refresh().await {
                        Ok(_) => {
                            debug!(request_id = %request_id, "Credentials renewed, resending");
                            AttemptState::Attempting { attempt }
                        }
                        Err(auth_err) => {
                            warn!(
                                request_id = %request_id,
                                error = %auth_err,
                                "Token refresh failed; re-authentication required"
                            );
                            AttemptState::Failed(error)
                        }
                    }
                }

                AttemptState::Retrying { attempt, delay } => {
                    metrics().increment("api.retries");
                    debug!(
                        request_id = %request_id,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis(),
                        "Retrying after delay"
                    );
                    tokio::time::sleep(delay).await;
                    AttemptState::Attempting {
                        attempt: attempt + 1,
                    }
                }

                AttemptState::Succeeded(response) => return Ok(response),
                AttemptState::Failed(err) => return Err(err),
            };
        }
    }

    /// Headers for one attempt; rebuilt each time so a renewed token is picked up
    fn headers(&self, config: &RequestConfig, request_id: &str) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::from([
            ("Accept".to_string(), JSON.to_string()),
            ("Content-Type".to_string(), JSON.to_string()),
        ]);
        headers.extend(config.headers.clone());
        headers.insert(X_REQUEST_ID.to_string(), request_id.to_string());

        if !config.skip_auth {
            if let Some(token) = self.auth.current_token() {
                headers.insert("Authorization".to_string(), format!("Bearer {token}"));
            }
        }

        headers
    }

    // -------------------------------------------------------------------------
    // Convenience wrappers
    // -------------------------------------------------------------------------

    /// Perform a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<ApiResponse<T>> {
        self.request(RequestConfig::get(path)).await
    }

    /// Perform a POST request with a JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<ApiResponse<T>> {
        self.request(RequestConfig::post(path).with_json(body)?).await
    }

    /// Perform a PUT request with a JSON body
    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<ApiResponse<T>> {
        self.request(RequestConfig::put(path).with_json(body)?).await
    }

    /// Perform a PATCH request with a JSON body
    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<ApiResponse<T>> {
        self.request(RequestConfig::patch(path).with_json(body)?).await
    }

    /// Perform a DELETE request
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ApiResult<ApiResponse<T>> {
        self.request(RequestConfig::delete(path)).await
    }

    /// GET with per-request options (query, headers, `skip_auth`, `skip_cache`, ...)
    ///
    /// ```rust,no_run
    /// # async fn run(client: leadflow_api_client::ApiClient) -> leadflow_api_client::ApiResult<()> {
    /// let leads: leadflow_api_client::ApiResponse<serde_json::Value> = client
    ///     .get_with("leads", |req| req.with_query("status", "new").skip_cache())
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_with<T, F>(&self, path: &str, options: F) -> ApiResult<ApiResponse<T>>
    where
        T: DeserializeOwned,
        F: FnOnce(RequestConfig) -> RequestConfig,
    {
        self.request(options(RequestConfig::get(path))).await
    }

    /// DELETE with per-request options, including an optional body
    pub async fn delete_with<T, F>(&self, path: &str, options: F) -> ApiResult<ApiResponse<T>>
    where
        T: DeserializeOwned,
        F: FnOnce(RequestConfig) -> RequestConfig,
    {
        self.request(options(RequestConfig::delete(path))).await
    }

    // -------------------------------------------------------------------------
    // Cache, credentials, and offline queue
    // -------------------------------------------------------------------------

    /// Drop the cached response for `key`
    pub fn invalidate(&self, key: &str) -> bool {
        self.cache.invalidate(key)
    }

    /// Drop every cached response under the endpoint `prefix`
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        self.cache.invalidate_prefix(prefix)
    }

    /// Drop every cached response
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Cache counters
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Adopt credentials from a successful login
    pub fn login(&self, pair: TokenPair) {
        self.auth.login(pair);
    }

    /// Forget credentials and every response cached under them
    pub fn logout(&self) {
        self.auth.clear();
        self.cache.clear();
    }

    /// Replay queued requests now, unless still offline
    pub async fn replay_pending(&self) -> DrainReport {
        if !self.network.is_online() {
            return DrainReport {
                remaining: self.queue.len(),
                ..DrainReport::default()
            };
        }

        self.queue
            .drain(&self.config.retry, |config| self.replay_one(config))
            .await
    }

    async fn replay_one(&self, config: RequestConfig) -> ApiResult<()> {
        self.fetch(&config).await.map(drop)
    }

    /// Replay the queue every time connectivity comes back.
    ///
    /// Runs until the returned handle is aborted.
    pub fn spawn_reconnect_replay(&self) -> JoinHandle<()> {
        let client = self.clone();
        let mut changes = self.network.subscribe();

        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let online = *changes.borrow_and_update();
                if online && !client.queue.is_empty() {
                    let report = client.replay_pending().await;
                    debug!(
                        sent = report.sent,
                        dropped = report.dropped,
                        remaining = report.remaining,
                        "Reconnect replay finished"
                    );
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::request::HttpMethod;
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    /// Transport replaying a script of outcomes, `200 null` once it runs out
    #[derive(Default)]
    struct FakeTransport {
        script: Mutex<VecDeque<ApiResult<ApiResponse<Value>>>>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl FakeTransport {
        fn new(script: Vec<ApiResult<ApiResponse<Value>>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                seen: Mutex::default(),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn execute(&self, request: HttpRequest) -> ApiResult<ApiResponse<Value>> {
            self.seen.lock().unwrap().push(request);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| ok(Value::Null))
        }
    }

    /// Refresher issuing `fresh-N` tokens after a short delay
    struct FakeRefresher {
        calls: AtomicUsize,
        fail: bool,
    }

    impl FakeRefresher {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenRefresher for FakeRefresher {
        async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.fail {
                return Err(AuthError::Rejected {
                    status: 401,
                    message: "refresh token expired".into(),
                });
            }
            Ok(TokenPair::new(format!("fresh-{n}"), refresh_token))
        }
    }

    fn ok(data: Value) -> ApiResult<ApiResponse<Value>> {
        Ok(ApiResponse {
            data,
            status: 200,
            headers: BTreeMap::new(),
            cached: false,
        })
    }

    fn fail(status: u16) -> ApiResult<ApiResponse<Value>> {
        Err(ApiError::http(status, format!("HTTP {status}")))
    }

    struct Harness {
        client: ApiClient,
        transport: Arc<FakeTransport>,
        refresher: Arc<FakeRefresher>,
    }

    fn harness(script: Vec<ApiResult<ApiResponse<Value>>>) -> Harness {
        harness_with(script, FakeRefresher::new(false))
    }

    fn harness_with(
        script: Vec<ApiResult<ApiResponse<Value>>>,
        refresher: Arc<FakeRefresher>,
    ) -> Harness {
        let transport = FakeTransport::new(script);
        let store = MemoryTokenStore::with_tokens(TokenPair::new("stale", "refresh-1"));
        let client = ApiClient::builder(
            ClientConfig::default().with_base_url("https://crm.example.com/api"),
        )
        .transport(transport.clone())
        .token_store(Arc::new(store))
        .refresher(refresher.clone())
        .build()
        .unwrap();

        Harness {
            client,
            transport,
            refresher,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_is_respected() {
        let h = harness(vec![fail(503), fail(503), fail(503), fail(503)]);
        let started = tokio::time::Instant::now();

        let err = h
            .client
            .request_value(RequestConfig::get("leads").with_retries(2))
            .await
            .unwrap_err();

        assert_eq!(err.status(), 503);
        assert_eq!(h.transport.calls(), 3);
        // 1000ms + 2000ms of backoff
        assert!(started.elapsed() >= Duration::from_millis(3_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_surface_last_error() {
        let h = harness(vec![fail(503), Err(ApiError::Network("reset".into()))]);

        let err = h
            .client
            .request_value(RequestConfig::get("leads").with_retries(1))
            .await
            .unwrap_err();

        assert!(err.is_network_error());
        assert_eq!(h.transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_does_not_consume_retry_budget() {
        let h = harness(vec![fail(401), ok(json!({"id": 7}))]);

        let response = h
            .client
            .request_value(RequestConfig::get("leads/7").with_retries(1))
            .await
            .unwrap();

        assert_eq!(response.data["id"], 7);
        assert_eq!(h.refresher.calls(), 1);

        let requests = h.transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].headers["Authorization"], "Bearer stale");
        assert_eq!(requests[1].headers["Authorization"], "Bearer fresh-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_then_retry_uses_full_budget() {
        // 401 -> refresh -> 503 -> retry -> 200, with a single retry allowed
        let h = harness(vec![fail(401), fail(503), ok(json!([]))]);

        let response = h
            .client
            .request_value(RequestConfig::get("leads").with_retries(1))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(h.transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_short_circuits() {
        let h = harness(vec![fail(404)]);

        let err = assert_err!(
            h.client
                .request_value(RequestConfig::get("leads/404").with_retries(3))
                .await
        );

        assert_eq!(err.status(), 404);
        assert_eq!(h.transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_unauthorized_is_propagated() {
        let h = harness(vec![fail(401), fail(401), ok(Value::Null)]);

        let err = h
            .client
            .request_value(RequestConfig::get("leads"))
            .await
            .unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(h.transport.calls(), 2);
        assert_eq!(h.refresher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_propagates_original_401_and_logs_out() {
        let h = harness_with(vec![fail(401)], FakeRefresher::new(true));

        let err = h
            .client
            .request_value(RequestConfig::get("leads"))
            .await
            .unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "API error (401): HTTP 401");
        assert_eq!(h.transport.calls(), 1);
        assert_eq!(h.client.auth().current_token(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_auth_never_refreshes() {
        let h = harness(vec![fail(401)]);

        let err = h
            .client
            .request_value(RequestConfig::post("auth/login").skip_auth())
            .await
            .unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(h.refresher.calls(), 0);
        assert!(!h.transport.requests()[0].headers.contains_key("Authorization"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_401s_share_one_refresh() {
        let h = harness(vec![fail(401), fail(401)]);

        let (a, b) = tokio::join!(
            h.client.request_value(RequestConfig::post("leads")),
            h.client.request_value(RequestConfig::post("notes")),
        );

        assert_ok!(a);
        assert_ok!(b);
        assert_eq!(h.refresher.calls(), 1);
        assert_eq!(h.transport.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_headers_and_url() {
        let h = harness(vec![fail(503)]);

        h.client
            .request_value(
                RequestConfig::get("leads")
                    .with_query("status", "new")
                    .with_query("owner", Value::Null)
                    .with_header("X-Tenant", "acme"),
            )
            .await
            .unwrap();

        let requests = h.transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0].url.as_str(),
            "https://crm.example.com/api/leads?status=new"
        );
        assert_eq!(requests[0].method, HttpMethod::Get);

        let headers = &requests[0].headers;
        assert_eq!(headers["Accept"], "application/json");
        assert_eq!(headers["Content-Type"], "application/json");
        assert_eq!(headers["X-Tenant"], "acme");
        // Retries of one logical request share its correlation ID
        assert_eq!(headers[X_REQUEST_ID], requests[1].headers[X_REQUEST_ID]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leads_cache_lifecycle() {
        let h = harness(vec![ok(json!({"items": []})), ok(json!({"items": [1]}))]);
        let leads = || RequestConfig::get("leads").with_query("status", "new");

        let first = h.client.request_value(leads()).await.unwrap();
        assert!(!first.cached);
        assert_eq!(first.data, json!({"items": []}));

        let second = h.client.request_value(leads()).await.unwrap();
        assert!(second.cached);
        assert_eq!(second.data, json!({"items": []}));
        assert_eq!(h.transport.calls(), 1);

        tokio::time::advance(Duration::from_millis(60_001)).await;

        let third = h.client.request_value(leads()).await.unwrap();
        assert!(!third.cached);
        assert_eq!(third.data, json!({"items": [1]}));
        assert_eq!(h.transport.calls(), 2);

        let stats = h.client.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_cache_and_writes_bypass_cache() {
        let h = harness(vec![]);

        h.client.request_value(RequestConfig::post("leads")).await.unwrap();
        h.client.request_value(RequestConfig::post("leads")).await.unwrap();
        h.client
            .request_value(RequestConfig::get("leads").skip_cache())
            .await
            .unwrap();
        h.client
            .request_value(RequestConfig::get("leads").skip_cache())
            .await
            .unwrap();

        assert_eq!(h.transport.calls(), 4);
        assert_eq!(h.client.cache_stats().entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_prefix_forces_refetch() {
        let h = harness(vec![]);

        h.client.request_value(RequestConfig::get("leads")).await.unwrap();
        h.client
            .request_value(RequestConfig::get("leads").with_query("page", 2))
            .await
            .unwrap();
        assert_eq!(h.client.invalidate_prefix("leads"), 2);

        h.client.request_value(RequestConfig::get("leads")).await.unwrap();
        assert_eq!(h.transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_fails_fast_and_queues() {
        let h = harness(vec![]);
        h.client.network().set_online(false);

        let err = h
            .client
            .request_value(RequestConfig::post("leads").with_body(json!({"name": "Ada"})))
            .await
            .unwrap_err();

        assert!(err.is_offline());
        assert_eq!(err.status(), 0);
        assert_eq!(h.transport.calls(), 0);

        let ApiError::Offline { queued_id: Some(id) } = err else {
            panic!("expected a queued offline error");
        };
        let queued = h.client.queue().snapshot();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].id, id);
        assert_eq!(queued[0].config.path, "leads");
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_pending() {
        let h = harness(vec![]);
        h.client.network().set_online(false);
        for path in ["leads", "notes"] {
            let _ = h.client.request_value(RequestConfig::post(path)).await;
        }

        // Still offline: nothing is sent
        let report = h.client.replay_pending().await;
        assert_eq!(report.remaining, 2);
        assert_eq!(h.transport.calls(), 0);

        h.client.network().set_online(true);
        let report = h.client.replay_pending().await;
        assert_eq!(report, DrainReport { sent: 2, dropped: 0, remaining: 0 });

        let paths: Vec<_> = h
            .transport
            .requests()
            .into_iter()
            .map(|r| r.url.path().to_string())
            .collect();
        assert_eq!(paths, vec!["/api/leads", "/api/notes"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_drops_status_outside_retry_set() {
        let h = harness(vec![fail(501)]);
        h.client.network().set_online(false);
        for path in ["broken", "good"] {
            let _ = h.client.request_value(RequestConfig::post(path)).await;
        }

        h.client.network().set_online(true);
        let report = h.client.replay_pending().await;
        assert_eq!(report, DrainReport { sent: 1, dropped: 1, remaining: 0 });
        assert!(h.client.queue().is_empty());

        let paths: Vec<_> = h
            .transport
            .requests()
            .into_iter()
            .map(|r| r.url.path().to_string())
            .collect();
        assert_eq!(paths, vec!["/api/broken", "/api/good"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_triggers_replay() {
        let h = harness(vec![]);
        h.client.network().set_online(false);
        let _ = h.client.request_value(RequestConfig::post("leads")).await;

        let replay = h.client.spawn_reconnect_replay();
        h.client.network().set_online(true);

        for _ in 0..100 {
            if h.client.queue().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(h.client.queue().is_empty());
        assert_eq!(h.transport.calls(), 1);
        replay.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_typed_wrappers() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Lead {
            id: u32,
            name: String,
        }

        let h = harness(vec![
            ok(json!({"id": 1, "name": "Ada"})),
            ok(json!({"unexpected": true})),
        ]);

        let created: ApiResponse<Lead> = h
            .client
            .post("leads", &json!({"name": "Ada"}))
            .await
            .unwrap();
        assert_eq!(created.data, Lead { id: 1, name: "Ada".into() });
        assert_eq!(h.transport.requests()[0].body, Some(json!({"name": "Ada"})));

        let err = h.client.get::<Lead>("leads/1").await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrappers_with_options() {
        let h = harness(vec![ok(json!([])), ok(json!(null))]);

        let leads: ApiResponse<Vec<Value>> = h
            .client
            .get_with("leads", |req| {
                req.with_query("status", "new").skip_auth().skip_cache()
            })
            .await
            .unwrap();
        assert!(leads.data.is_empty());
        assert_eq!(h.client.cache_stats().entries, 0);

        let _: ApiResponse<Value> = h
            .client
            .delete_with("leads/7", |req| req.with_body(json!({"reason": "duplicate"})))
            .await
            .unwrap();

        let requests = h.transport.requests();
        assert_eq!(
            requests[0].url.as_str(),
            "https://crm.example.com/api/leads?status=new"
        );
        assert!(!requests[0].headers.contains_key("Authorization"));
        assert_eq!(requests[1].method, HttpMethod::Delete);
        assert_eq!(requests[1].body, Some(json!({"reason": "duplicate"})));
        assert_eq!(requests[1].headers["Authorization"], "Bearer stale");
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_clears_credentials_and_cache() {
        let h = harness(vec![]);
        h.client.request_value(RequestConfig::get("leads")).await.unwrap();
        assert_eq!(h.client.cache_stats().entries, 1);

        h.client.logout();

        assert_eq!(h.client.auth().current_token(), None);
        assert_eq!(h.client.cache_stats().entries, 0);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = ApiClient::builder(ClientConfig::default().with_base_url("not a url"))
            .transport(FakeTransport::new(vec![]))
            .build();
        assert!(matches!(result, Err(ApiError::Config(_))));
    }
}
