//! HTTP client for the inference backend.
//!
//! Every call is wrapped as `breaker(retry(send_once))`. An open circuit
//! rejects the call before any network I/O. Transport failures are retried;
//! once the retry budget is spent the call fails with
//! `UpstreamUnavailable` and the breaker records a single failure.

use gateway_core::{GatewayError, GatewayResult};
use gateway_resilience::{
    CircuitBreaker, CircuitBreakerConfig, RetryConfig, RetryPolicy, RetryResult,
};
use gateway_telemetry::Metrics;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

/// Default backend address
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";

/// Upstream client configuration
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Backend base URL
    pub base_url: String,
    /// Total time allowed for one HTTP attempt
    pub timeout: Duration,
    /// Time allowed to establish a connection
    pub connect_timeout: Duration,
    /// Idle connections kept per host
    pub pool_max_idle_per_host: usize,
    /// Retry policy for transport failures
    pub retry: RetryConfig,
    /// Circuit breaker guarding the backend
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(10),
            pool_max_idle_per_host: 32,
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl UpstreamConfig {
    /// Create a configuration for `base_url` with default resilience settings
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the per-attempt timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the circuit breaker configuration
    #[must_use]
    pub fn with_circuit_breaker(mut self, circuit_breaker: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }
}

/// One turn of conversation context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `user`, `assistant` or `system`
    pub role: String,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Create a message
    #[must_use]
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

struct Inner {
    config: UpstreamConfig,
    base_url: String,
    http: Client,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    metrics: Option<Metrics>,
}

/// Resilient client for the inference backend.
///
/// Cheap to clone; clones share the connection pool and the breaker.
#[derive(Clone)]
pub struct UpstreamClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("base_url", &self.inner.base_url)
            .field("breaker", &self.inner.breaker.state())
            .finish_non_exhaustive()
    }
}

impl UpstreamClient {
    /// Create a client.
    ///
    /// # Errors
    /// Returns `Configuration` if the base URL is invalid, or `Internal` if
    /// the HTTP client cannot be built
    pub fn new(config: UpstreamConfig) -> GatewayResult<Self> {
        Self::build(config, None)
    }

    /// Create a client that reports attempts and failures to `metrics`.
    ///
    /// # Errors
    /// Same as [`UpstreamClient::new`]
    pub fn with_metrics(config: UpstreamConfig, metrics: Metrics) -> GatewayResult<Self> {
        Self::build(config, Some(metrics))
    }

    fn build(config: UpstreamConfig, metrics: Option<Metrics>) -> GatewayResult<Self> {
        let parsed = Url::parse(&config.base_url).map_err(|e| {
            GatewayError::configuration(format!("Invalid upstream URL '{}': {e}", config.base_url))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(GatewayError::configuration(format!(
                "Unsupported upstream URL scheme '{}'",
                parsed.scheme()
            )));
        }
        let base_url = config.base_url.trim_end_matches('/').to_string();

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()
            .map_err(|e| GatewayError::internal(format!("Failed to create HTTP client: {e}")))?;

        let breaker = Arc::new(CircuitBreaker::new(
            parsed.host_str().unwrap_or("upstream"),
            config.circuit_breaker.clone(),
        ));
        let retry = RetryPolicy::new(config.retry.clone());

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                base_url,
                http,
                breaker,
                retry,
                metrics,
            }),
        })
    }

    /// Client configuration
    #[must_use]
    pub fn config(&self) -> &UpstreamConfig {
        &self.inner.config
    }

    /// Normalized base URL, without a trailing slash
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Breaker guarding this client
    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.inner.breaker
    }

    /// Send one logical request and return the parsed JSON body.
    ///
    /// The work runs on its own task: if the caller stops waiting, the
    /// attempt and its retries still complete and the breaker still sees
    /// the outcome.
    ///
    /// # Errors
    /// - `CircuitOpen` when the breaker rejects the call (no I/O happens)
    /// - `UpstreamUnavailable` when every attempt failed at the transport level
    /// - `NotFound` for a 404, `UpstreamHttp` for any other non-2xx status
    /// - `InvalidResponse` when a 2xx body is not JSON
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> GatewayResult<Value> {
        let inner = Arc::clone(&self.inner);
        let path = path.to_string();
        tokio::spawn(async move { inner.guarded(method, path, body).await })
            .await
            .map_err(|e| GatewayError::internal(format!("Upstream task failed: {e}")))?
    }

    /// `GET path`
    ///
    /// # Errors
    /// See [`UpstreamClient::call`]
    pub async fn get(&self, path: &str) -> GatewayResult<Value> {
        self.call(Method::GET, path, None).await
    }

    /// `POST path` with a JSON body
    ///
    /// # Errors
    /// See [`UpstreamClient::call`]
    pub async fn post(&self, path: &str, body: Value) -> GatewayResult<Value> {
        self.call(Method::POST, path, Some(body)).await
    }

    /// Whether the backend answers its model listing endpoint
    pub async fn check_health(&self) -> bool {
        match self.get("/api/tags").await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Upstream health check failed");
                false
            }
        }
    }

    /// Generate a completion.
    ///
    /// With conversation context the chat endpoint is used; if it answers
    /// with an application-level error the plain generate endpoint is tried
    /// instead. Availability errors are returned without a fallback.
    ///
    /// # Errors
    /// See [`UpstreamClient::call`]
    pub async fn generate(
        &self,
        model: &str,
        prompt: &str,
        context: &[ChatMessage],
    ) -> GatewayResult<Value> {
        if !context.is_empty() {
            let mut messages = context.to_vec();
            messages.push(ChatMessage::new("user", prompt));
            let payload = json!({
                "model": model,
                "messages": messages,
                "stream": false,
            });

            match self.post("/api/chat", payload).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_recoverable() => return Err(e),
                Err(e) => {
                    warn!(model = %model, error = %e, "Chat endpoint failed, falling back to generate");
                }
            }
        }

        let payload = json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
        });
        let result = self.post("/api/generate", payload).await;
        if let Err(GatewayError::NotFound { .. }) = &result {
            warn!(model = %model, "Model may not be installed, try pulling it");
        }
        result
    }

    /// Ask the backend to pull `model`. Returns whether the pull succeeded.
    pub async fn pull_model(&self, model: &str) -> bool {
        match self
            .post("/api/pull", json!({ "name": model, "stream": false }))
            .await
        {
            Ok(_) => {
                info!(model = %model, "Pulled model");
                true
            }
            Err(e) => {
                error!(model = %model, error = %e, "Failed to pull model");
                false
            }
        }
    }
}

/// Extract the generated text from a chat or generate response
#[must_use]
pub fn response_text(response: &Value) -> Option<&str> {
    response
        .pointer("/message/content")
        .or_else(|| response.get("response"))
        .and_then(Value::as_str)
}

impl Inner {
    async fn guarded(&self, method: Method, path: String, body: Option<Value>) -> GatewayResult<Value> {
        let method = &method;
        let path = path.as_str();
        let body = body.as_ref();

        let result = self
            .breaker
            .execute(|| async {
                match self
                    .retry
                    .execute_with_outcome(move || self.send_once(method, path, body))
                    .await
                {
                    RetryResult::Success(value) => Ok(value),
                    RetryResult::Failed { error, attempts } => Err(
                        GatewayError::upstream_unavailable(attempts, error.to_string()),
                    ),
                    RetryResult::NonRetryable { error } => Err(error),
                }
            })
            .await;

        if let Some(metrics) = &self.metrics {
            metrics.set_circuit_open(self.breaker.is_open());
            if let Err(e) = &result {
                metrics.record_upstream_failure(e.error_type());
            }
        }
        result
    }

    async fn send_once(
        &self,
        method: &Method,
        path: &str,
        body: Option<&Value>,
    ) -> GatewayResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        if let Some(metrics) = &self.metrics {
            metrics.record_upstream_attempt();
        }
        debug!(method = %method, url = %url, "Sending upstream request");

        let mut request = self.http.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            error!(url = %url, "Upstream endpoint not found");
            return Err(GatewayError::not_found(path));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(url = %url, status = status.as_u16(), "Upstream returned error status");
            return Err(GatewayError::upstream_http(status.as_u16(), text));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(&e))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| GatewayError::invalid_response(format!("Upstream body is not JSON: {e}")))
    }

    fn transport_error(&self, error: &reqwest::Error) -> GatewayError {
        if error.is_timeout() {
            GatewayError::timeout(self.config.timeout)
        } else {
            GatewayError::connection(error.to_string())
        }
    }
}
