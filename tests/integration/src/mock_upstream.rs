//! Mock inference backend for integration testing
//!
//! Wiremock server that answers the Ollama-style endpoints the gateway uses.

use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock backend
pub struct MockUpstream {
    /// Underlying wiremock server
    pub server: MockServer,
}

impl MockUpstream {
    /// Start a backend with no endpoints mounted
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL for the gateway configuration
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Serve `models` from `/api/tags`
    pub async fn mock_tags(&self, models: &[&str]) {
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tags_body(models)))
            .mount(&self.server)
            .await;
    }

    /// Serve `models` from `/api/tags` once, then answer 503
    pub async fn mock_tags_then_fail(&self, models: &[&str]) {
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tags_body(models)))
            .up_to_n_times(1)
            .mount(&self.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&self.server)
            .await;
    }

    /// Answer `/api/generate` for `model` with `text`, expecting exactly `calls`
    pub async fn mock_generate(&self, model: &str, text: &str, calls: u64) {
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({ "model": model, "stream": false })))
            .respond_with(ResponseTemplate::new(200).set_body_json(generate_body(model, text)))
            .expect(calls)
            .named("generate")
            .mount(&self.server)
            .await;
    }

    /// Answer `/api/generate` after `delay`, expecting exactly `calls`
    pub async fn mock_generate_delayed(&self, delay: Duration, calls: u64) {
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(generate_body("llama3", "too late"))
                    .set_delay(delay),
            )
            .expect(calls)
            .named("slow generate")
            .mount(&self.server)
            .await;
    }

    /// Answer `/api/generate` with `status`
    pub async fn mock_generate_status(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(status).set_body_string("backend exploded"))
            .mount(&self.server)
            .await;
    }

    /// Requests received on `endpoint`
    pub async fn hits(&self, endpoint: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == endpoint)
            .count()
    }
}

/// `/api/tags` body listing `models`
pub fn tags_body(models: &[&str]) -> Value {
    json!({
        "models": models
            .iter()
            .map(|name| json!({ "name": name, "size": 4_109_865_159_u64 }))
            .collect::<Vec<_>>()
    })
}

/// Non-streaming `/api/generate` body
pub fn generate_body(model: &str, text: &str) -> Value {
    json!({
        "model": model,
        "response": text,
        "done": true,
    })
}
