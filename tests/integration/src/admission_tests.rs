//! Admission control integration tests
//!
//! Per-client limits, the 429 contract, exempt paths and adaptive
//! tightening of the upstream tier, all through the real server.

use crate::helpers::*;
use crate::mock_upstream::*;
use serde_json::json;
use std::time::Duration;

/// Sixty requests pass with a falling remaining count, the next is refused
#[tokio::test]
async fn test_sixty_one_requests_from_one_client() {
    let upstream = MockUpstream::new().await;
    upstream.mock_tags(&["llama3:latest"]).await;
    let gateway = TestGateway::start(test_config(&upstream.url())).await;

    for i in 0..60_u64 {
        let response = gateway.get_as("198.51.100.1", "/api/models").await;
        assert_status(&response, 200);
        assert_eq!(header_u64(&response, "x-ratelimit-limit"), 60);
        assert_eq!(header_u64(&response, "x-ratelimit-remaining"), 59 - i);
    }

    let response = gateway.get_as("198.51.100.1", "/api/models").await;
    assert_status(&response, 429);
    assert_eq!(header_u64(&response, "x-ratelimit-remaining"), 0);
    let retry_header = header_u64(&response, "retry-after");
    assert!(retry_header > 0 && retry_header <= 60);
    assert!(header_u64(&response, "x-ratelimit-reset") > 0);

    let body = json_body(response).await;
    assert_eq!(body["error"], "Rate limit exceeded");
    assert_eq!(body["retry_after"], retry_header);
}

/// One client's exhaustion does not affect another
#[tokio::test]
async fn test_clients_are_independent() {
    let upstream = MockUpstream::new().await;
    upstream.mock_tags(&[]).await;
    let mut config = test_config(&upstream.url());
    config.admission.per_client_requests_per_minute = 3;
    let gateway = TestGateway::start(config).await;

    for _ in 0..3 {
        assert_status(&gateway.get_as("203.0.113.1", "/api/models").await, 200);
    }
    assert_status(&gateway.get_as("203.0.113.1", "/api/models").await, 429);

    let response = gateway.get_as("203.0.113.2", "/api/models").await;
    assert_status(&response, 200);
    assert_eq!(header_u64(&response, "x-ratelimit-remaining"), 2);
}

/// Health and metrics never count against a client
#[tokio::test]
async fn test_exempt_paths_are_not_limited() {
    let upstream = MockUpstream::new().await;
    let mut config = test_config(&upstream.url());
    config.admission.per_client_requests_per_minute = 1;
    let gateway = TestGateway::start(config).await;

    for _ in 0..20 {
        let response = gateway.get("/health").await;
        assert_status(&response, 200);
        assert!(response.headers().get("x-ratelimit-limit").is_none());
    }
    assert_status(&gateway.get("/metrics").await, 200);

    // the single allowed request is still available
    upstream.mock_tags(&[]).await;
    assert_status(&gateway.get("/api/models").await, 200);
}

/// The global bucket refuses before any client tier is consulted
#[tokio::test]
async fn test_global_bucket_limits_all_clients() {
    let upstream = MockUpstream::new().await;
    upstream.mock_tags(&[]).await;
    let mut config = test_config(&upstream.url());
    config.admission.global_requests_per_minute = 2;
    config.admission.global_burst_multiplier = 1;
    let gateway = TestGateway::start(config).await;

    assert_status(&gateway.get_as("192.0.2.1", "/api/models").await, 200);
    assert_status(&gateway.get_as("192.0.2.2", "/api/models").await, 200);

    let response = gateway.get_as("192.0.2.3", "/api/models").await;
    assert_status(&response, 429);
    assert!(header_u64(&response, "retry-after") >= 1);
    assert_eq!(header_u64(&response, "x-ratelimit-limit"), 2);
}

/// Upstream failures shrink the per-client limit for upstream-bound paths
#[tokio::test]
async fn test_upstream_errors_tighten_adaptive_limit() {
    let upstream = MockUpstream::new().await;
    upstream.mock_tags(&["llama3:latest"]).await;
    upstream.mock_generate_status(500).await;
    let mut config = test_config(&upstream.url());
    config.admission.upstream_base_requests_per_minute = 10;
    config.admission.adjustment_interval = Duration::ZERO;
    let gateway = TestGateway::start(config).await;

    let response = gateway.chat(&json!({ "message": "hello" })).await;
    assert_status(&response, 502);
    assert_eq!(json_body(response).await["upstream_status"], 500);
    assert_eq!(gateway.state.gate.upstream_controller().current_limit(), 10);

    // the next admission check closes the cycle: 100% errors, floor(10 * 0.8)
    let response = gateway.chat(&json!({ "message": "hello again" })).await;
    assert_status(&response, 502);
    assert_eq!(gateway.state.gate.upstream_controller().current_limit(), 8);

    // general endpoints are unaffected
    let response = gateway.get("/api/models").await;
    assert_status(&response, 200);
    assert_eq!(header_u64(&response, "x-ratelimit-limit"), 60);
}
