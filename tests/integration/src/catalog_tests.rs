//! Model catalog integration tests

use crate::helpers::*;
use crate::mock_upstream::*;
use serde_json::json;

/// A failed refresh keeps resolving against the last good list
#[tokio::test]
async fn test_stale_catalog_still_resolves() {
    let upstream = MockUpstream::new().await;
    upstream.mock_tags_then_fail(&["mistral:7b"]).await;
    upstream.mock_generate("mistral:7b", "Bonjour", 2).await;
    let mut config = test_config(&upstream.url());
    config.catalog.model_cache_ttl_seconds = 0;
    let gateway = TestGateway::start(config).await;

    for _ in 0..2 {
        let response = gateway
            .chat(&json!({ "message": "salut", "model": "mistral" }))
            .await;
        assert_status(&response, 200);
        let body = json_body(response).await;
        assert_eq!(body["model"], "mistral:7b");
        assert_eq!(body["response"], "Bonjour");
    }

    assert_eq!(upstream.hits("/api/tags").await, 2);
    assert!(!gateway.state.upstream.breaker().is_open());
}

/// With no catalog at all the requested model is passed through
#[tokio::test]
async fn test_empty_catalog_passes_model_through() {
    let upstream = MockUpstream::new().await;
    upstream.mock_generate("phi3", "hello", 1).await;
    let gateway = TestGateway::start(test_config(&upstream.url())).await;

    let response = gateway
        .chat(&json!({ "message": "hi", "model": "phi3" }))
        .await;

    assert_status(&response, 200);
    assert_eq!(json_body(response).await["model"], "phi3");
}

/// A fresh catalog is fetched once and then served from memory
#[tokio::test]
async fn test_catalog_is_cached() {
    let upstream = MockUpstream::new().await;
    upstream.mock_tags(&["llama3:latest", "mistral:7b"]).await;
    upstream.mock_generate("llama3:latest", "hi", 3).await;
    let gateway = TestGateway::start(test_config(&upstream.url())).await;

    for _ in 0..3 {
        assert_status(&gateway.chat(&json!({ "message": "hi" })).await, 200);
    }
    assert_eq!(upstream.hits("/api/tags").await, 1);

    let response = gateway.get("/api/models").await;
    assert_status(&response, 200);
    let body = json_body(response).await;
    assert_eq!(body["installed_models"], json!(["llama3:latest", "mistral:7b"]));
    assert_eq!(body["upstream_healthy"], true);
}
