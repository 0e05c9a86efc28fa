//! Request middleware: admission control and access logging.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use gateway_core::{EndpointClass, GatewayError, RateLimitDecision};
use gateway_ratelimit::AdmissionTier;
use gateway_telemetry::AdmissionLabel;
use std::time::Instant;
use tracing::{info, warn};

use crate::{error::ApiError, extractors::ClientIp, state::AppState};

/// `X-RateLimit-Limit`
pub const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
/// `X-RateLimit-Remaining`
pub const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
/// `X-RateLimit-Reset`
pub const RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Paths that bypass admission control
#[must_use]
pub fn is_exempt(path: &str) -> bool {
    matches!(path, "/health" | "/metrics") || path.starts_with("/static")
}

/// Run the admission gate in front of every non-exempt route.
///
/// Denied requests get a 429 with the rate-limit headers. Admitted requests
/// get the same headers on their response, and their outcome (5xx is a
/// failure) is reported back to the gate exactly once.
pub async fn admission_middleware(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    if is_exempt(&path) {
        return next.run(request).await;
    }

    let class = EndpointClass::from_path(&path, state.upstream_paths());
    let outcome = state.gate.evaluate(&client, class);

    let label = match outcome.denied_by {
        None => AdmissionLabel::Admitted,
        Some(AdmissionTier::Global) => AdmissionLabel::DeniedGlobal,
        Some(AdmissionTier::Client) => AdmissionLabel::DeniedClient,
        Some(AdmissionTier::Upstream) => AdmissionLabel::DeniedUpstream,
    };
    state.metrics.record_admission(class.as_str(), label);

    if let Some(tier) = outcome.denied_by {
        warn!(
            client = %client,
            path = %path,
            tier = tier.as_str(),
            retry_after_secs = outcome.decision.retry_after_secs(),
            "Rate limit exceeded"
        );
        return rate_limited(&outcome.decision);
    }

    let mut response = next.run(request).await;

    state
        .gate
        .report_outcome(class, !response.status().is_server_error());
    if class == EndpointClass::Upstream {
        state
            .metrics
            .set_adaptive_limit(state.gate.upstream_controller().current_limit());
    }

    apply_rate_limit_headers(response.headers_mut(), &outcome.decision);
    response
}

/// 429 response for a denied decision
#[must_use]
pub fn rate_limited(decision: &RateLimitDecision) -> Response {
    let mut response = ApiError::from(GatewayError::admission_denied(decision.retry_after))
        .into_response();
    apply_rate_limit_headers(response.headers_mut(), decision);
    response
}

/// Set the `X-RateLimit-*` headers from a decision
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(RATE_LIMIT_RESET, HeaderValue::from(decision.reset_unix_timestamp()));
}

/// Log one line per request
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let start = Instant::now();

    let response = next.run(request).await;

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );
    response
}
