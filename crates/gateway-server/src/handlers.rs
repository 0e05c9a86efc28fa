//! HTTP request handlers for the gateway API.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use gateway_upstream::{response_text, ChatMessage, POPULAR_MODELS};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, instrument};
use validator::Validate;

use crate::{error::ApiError, extractors::JsonBody, state::AppState};

/// Text returned when the backend answers without any content
pub const EMPTY_RESPONSE: &str = "No response generated";

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` while the upstream circuit is open
    pub status: &'static str,
    /// Version
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime_seconds: u64,
    /// Upstream circuit breaker
    pub upstream: UpstreamHealth,
}

/// Circuit breaker view in the health response
#[derive(Debug, Serialize)]
pub struct UpstreamHealth {
    /// Backend base URL
    pub base_url: String,
    /// Breaker state
    pub circuit_state: &'static str,
    /// Consecutive failures recorded
    pub failure_count: u32,
}

/// Liveness plus breaker state. Never calls the backend.
pub async fn health_check(State(state): State<AppState>) -> Response {
    let stats = state.upstream.breaker().stats();
    let degraded = state.upstream.breaker().is_open();

    let body = HealthResponse {
        status: if degraded { "degraded" } else { "healthy" },
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        upstream: UpstreamHealth {
            base_url: state.upstream.base_url().to_string(),
            circuit_state: stats.state.as_str(),
            failure_count: stats.failure_count,
        },
    };

    let status = if degraded {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(body)).into_response()
}

/// Prometheus text exposition
pub async fn metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    state
        .metrics
        .set_circuit_open(state.upstream.breaker().is_open());
    state
        .metrics
        .set_adaptive_limit(state.gate.upstream_controller().current_limit());

    let body = state.metrics.gather().map_err(|e| {
        error!(error = %e, "Failed to render metrics");
        ApiError::internal("Failed to render metrics")
    })?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

/// Model listing response
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    /// Installed on the backend
    pub installed_models: Vec<String>,
    /// Available to pull
    pub popular_models: Vec<&'static str>,
    /// Backend answered the health probe
    pub upstream_healthy: bool,
}

/// List installed and popular models.
///
/// Probes the backend first and answers 503 when it is unreachable.
#[instrument(skip(state))]
pub async fn list_models(State(state): State<AppState>) -> Result<Json<ModelsResponse>, ApiError> {
    if !state.upstream.check_health().await {
        return Err(ApiError::service_unavailable("Upstream service not available"));
    }

    let installed_models = state.catalog.get_models(false).await;
    state.metrics.set_catalog_size(installed_models.len());

    Ok(Json(ModelsResponse {
        installed_models,
        popular_models: POPULAR_MODELS.to_vec(),
        upstream_healthy: true,
    }))
}

/// Pull request body
#[derive(Debug, Deserialize, Validate)]
pub struct PullRequest {
    /// Model to download
    #[validate(length(min = 1, max = 100))]
    pub model: String,
}

/// Ask the backend to pull a model, then refresh the catalog
#[instrument(skip(state, request), fields(model = %request.model))]
pub async fn pull_model(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<PullRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    request
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    if !state.upstream.pull_model(&request.model).await {
        return Err(ApiError::new(
            StatusCode::BAD_GATEWAY,
            "pull_failed",
            format!("Failed to pull model '{}'", request.model),
        ));
    }

    let installed = state.catalog.get_models(true).await;
    state.metrics.set_catalog_size(installed.len());

    Ok(Json(json!({
        "model": request.model,
        "pulled": true,
        "installed_models": installed,
    })))
}

/// Chat request body
#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    /// User message
    #[validate(length(min = 1, max = 10000))]
    pub message: String,
    /// Requested model, the configured default when absent
    #[serde(default)]
    #[validate(length(min = 1, max = 100))]
    pub model: Option<String>,
    /// Earlier turns of the conversation
    #[serde(default)]
    pub context: Vec<ChatMessage>,
}

/// Chat response body
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    /// Generated text
    pub response: String,
    /// Model that produced it
    pub model: String,
}

/// Generate a reply through the upstream client.
///
/// The requested model is resolved against the cached catalog first, so
/// `mistral` matches an installed `mistral:7b`. An unknown model is a 404
/// listing what is installed.
#[instrument(skip(state, request))]
pub async fn chat(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    request
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::bad_request("Message cannot be empty"));
    }

    let requested = request
        .model
        .unwrap_or_else(|| state.config.upstream.default_model.clone());

    let Some(model) = state.catalog.resolve_model(&requested).await else {
        let installed = state.catalog.get_models(false).await;
        info!(model = %requested, "Requested model is not installed");
        return Err(ApiError::not_found(format!("Model '{requested}' is not available"))
            .with_detail("available_models", installed)
            .with_detail("hint", format!("Pull it first: ollama pull {requested}")));
    };

    debug!(model = %model, context_messages = request.context.len(), "Generating");

    let response = state
        .upstream
        .generate(&model, message, &request.context)
        .await?;

    let text = response_text(&response)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(EMPTY_RESPONSE)
        .to_string();

    Ok(Json(ChatResponse {
        response: text,
        model,
    }))
}
