//! Test helper utilities for integration tests

use gateway_config::GatewayConfig;
use gateway_server::{AppState, Server, ServerConfig};
use once_cell::sync::Lazy;
use reqwest::{Client, Response};
use serde_json::Value;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Initialize tracing for tests (only once)
static TRACING: Lazy<()> = Lazy::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
});

/// Initialize tracing for tests
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// Configuration pointing at `upstream_url` with retry delays removed
pub fn test_config(upstream_url: &str) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.upstream.base_url = upstream_url.to_string();
    config.upstream.timeout_seconds = 1;
    config.upstream.backoff_min_seconds = 0;
    config.upstream.backoff_max_seconds = 0;
    config
}

/// A running gateway bound to an ephemeral port
pub struct TestGateway {
    /// The server address
    pub addr: SocketAddr,
    /// HTTP client for making requests
    pub client: Client,
    /// Shared state, for inspecting the gate and breaker
    pub state: AppState,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestGateway {
    /// Start a gateway with the given configuration
    pub async fn start(config: GatewayConfig) -> Self {
        init_tracing();

        let state = AppState::from_config(config).expect("Failed to build state");
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get local addr");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let server = Server::new(
            ServerConfig::new().with_shutdown_timeout(Duration::from_secs(1)),
            state.clone(),
        );
        tokio::spawn(server.serve(listener, async {
            let _ = shutdown_rx.await;
        }));

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create client");

        Self {
            addr,
            client,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the full URL for a path
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Request failed")
    }

    /// Make a GET request as a specific client
    pub async fn get_as(&self, client_ip: &str, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .header("X-Forwarded-For", client_ip)
            .send()
            .await
            .expect("Request failed")
    }

    /// POST a chat message
    pub async fn chat(&self, body: &Value) -> Response {
        self.client
            .post(self.url("/chat"))
            .json(body)
            .send()
            .await
            .expect("Request failed")
    }

    /// Shutdown the test gateway
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Parse response body as JSON
pub async fn json_body(response: Response) -> Value {
    response.json().await.expect("Failed to parse JSON")
}

/// Read a numeric header
pub fn header_u64(response: &Response, name: &str) -> u64 {
    response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("missing header {name}"))
        .to_str()
        .expect("non-ascii header")
        .parse()
        .expect("non-numeric header")
}

/// Assert that a response has the expected status code
pub fn assert_status(response: &Response, expected: u16) {
    assert_eq!(
        response.status().as_u16(),
        expected,
        "Expected status {}, got {}",
        expected,
        response.status()
    );
}
