//! Upstream resilience integration tests
//!
//! Retry exhaustion, circuit breaking and the errors the HTTP surface
//! reports for them.

use crate::helpers::*;
use crate::mock_upstream::*;
use gateway_resilience::CircuitState;
use serde_json::json;
use std::time::Duration;

/// Three timed-out attempts become one unavailable error and one breaker failure
#[tokio::test]
async fn test_timeouts_exhaust_retries() {
    let upstream = MockUpstream::new().await;
    upstream.mock_tags(&["llama3:latest"]).await;
    upstream.mock_generate_delayed(Duration::from_secs(3), 3).await;
    let gateway = TestGateway::start(test_config(&upstream.url())).await;

    let response = gateway.chat(&json!({ "message": "are you there?" })).await;

    assert_status(&response, 503);
    let body = json_body(response).await;
    assert_eq!(body["type"], "upstream_unavailable");
    assert_eq!(body["attempts"], 3);

    let stats = gateway.state.upstream.breaker().stats();
    assert_eq!(stats.failure_count, 1);
    assert_eq!(stats.state, CircuitState::Closed);
    assert_eq!(upstream.hits("/api/generate").await, 3);
}

/// Once open, the circuit rejects calls without touching the backend
#[tokio::test]
async fn test_open_circuit_fails_fast() {
    let upstream = MockUpstream::new().await;
    upstream.mock_tags(&["llama3:latest"]).await;
    upstream.mock_generate_delayed(Duration::from_secs(3), 1).await;
    let mut config = test_config(&upstream.url());
    config.upstream.max_retries = 1;
    config.resilience.circuit_breaker_threshold = 1;
    let gateway = TestGateway::start(config).await;

    let response = gateway.chat(&json!({ "message": "first" })).await;
    assert_status(&response, 503);
    assert_eq!(json_body(response).await["type"], "upstream_unavailable");
    assert!(gateway.state.upstream.breaker().is_open());

    let response = gateway.chat(&json!({ "message": "second" })).await;
    assert_status(&response, 503);
    assert_eq!(json_body(response).await["type"], "circuit_open");
    assert_eq!(upstream.hits("/api/generate").await, 1);

    let response = gateway.get("/health").await;
    assert_status(&response, 503);
    let body = json_body(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["upstream"]["circuit_state"], "open");
}

/// Backend HTTP errors are passed through and leave the breaker alone
#[tokio::test]
async fn test_http_errors_do_not_trip_breaker() {
    let upstream = MockUpstream::new().await;
    upstream.mock_tags(&["llama3:latest"]).await;
    upstream.mock_generate_status(500).await;
    let mut config = test_config(&upstream.url());
    config.resilience.circuit_breaker_threshold = 1;
    let gateway = TestGateway::start(config).await;

    for _ in 0..2 {
        let response = gateway.chat(&json!({ "message": "hi" })).await;
        assert_status(&response, 502);
        let body = json_body(response).await;
        assert_eq!(body["type"], "upstream_error");
        assert_eq!(body["upstream_status"], 500);
    }

    assert!(!gateway.state.upstream.breaker().is_open());
    // one attempt per call, HTTP errors are not retried
    assert_eq!(upstream.hits("/api/generate").await, 2);
}

/// An unreachable backend is reported as unavailable after all attempts
#[tokio::test]
async fn test_unreachable_backend() {
    let mut config = test_config("http://127.0.0.1:9");
    config.upstream.max_retries = 2;
    let gateway = TestGateway::start(config).await;

    let response = gateway.chat(&json!({ "message": "hi", "model": "phi3" })).await;

    assert_status(&response, 503);
    assert_eq!(json_body(response).await["attempts"], 2);

    let response = gateway.get("/api/models").await;
    assert_status(&response, 503);
    assert_eq!(
        json_body(response).await["error"],
        "Upstream service not available"
    );
}
