//! # Inference Gateway
//!
//! Admission control and upstream resilience in front of an Ollama-style
//! inference backend.
//!
//! ## Usage
//!
//! ```bash
//! # Start with default configuration
//! inference-gateway
//!
//! # Start with a config file
//! GATEWAY_CONFIG=/etc/gateway/config.yaml inference-gateway
//!
//! # Start with environment overrides
//! GATEWAY_PORT=9000 OLLAMA_URL=http://gpu-box:11434 inference-gateway
//! ```

use gateway_config::load_config;
use gateway_server::{AppState, Server, ServerConfig};
use gateway_telemetry::{init_logging, LoggingConfig};
use tracing::{error, info};

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "Application failed");
        eprintln!("inference-gateway: {e}");
        std::process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config().await?;

    let logging = LoggingConfig::new()
        .with_level(&config.logging.level)
        .with_format(config.logging.format);
    if let Err(e) = init_logging(&logging) {
        eprintln!("Failed to initialize logging: {e}");
    }
    config.log_warnings();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        upstream = %config.upstream.base_url,
        "Starting inference gateway"
    );

    let server_config = ServerConfig::new()
        .with_host(&config.server.host)
        .with_port(config.server.port)
        .with_shutdown_timeout(config.server.shutdown_timeout);

    let state = AppState::from_config(config)?;

    if state.upstream.check_health().await {
        let models = state.catalog.get_models(false).await;
        state.metrics.set_catalog_size(models.len());
        info!(models = models.len(), "Upstream reachable");
    } else {
        info!("Upstream not reachable yet, serving anyway");
    }

    Server::new(server_config, state).run().await?;

    Ok(())
}
