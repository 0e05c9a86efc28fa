//! HTTP server lifecycle.

use gateway_core::{GatewayError, GatewayResult};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::{routes::create_router, shutdown::shutdown_signal, state::AppState};

/// Listener settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Bind port, 0 for an ephemeral port
    pub port: u16,
    /// Grace period for in-flight requests after a shutdown signal
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Create with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the bind port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the shutdown grace period
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The gateway HTTP server
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a server
    #[must_use]
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Bind and serve until a shutdown signal.
    ///
    /// # Errors
    /// Returns error if the address cannot be bound or serving fails
    pub async fn run(self) -> GatewayResult<()> {
        let listener = TcpListener::bind(self.config.bind_addr())
            .await
            .map_err(|e| {
                GatewayError::configuration(format!(
                    "Failed to bind {}: {e}",
                    self.config.bind_addr()
                ))
            })?;
        self.serve(listener, async {
            shutdown_signal().await;
        })
        .await
    }

    /// Serve on an existing listener until `shutdown` resolves.
    ///
    /// After `shutdown`, in-flight requests get `shutdown_timeout` to finish.
    ///
    /// # Errors
    /// Returns error if the server fails
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> GatewayResult<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener
            .local_addr()
            .map_err(|e| GatewayError::internal(e.to_string()))?;
        let grace = self.config.shutdown_timeout;

        let maintenance = self
            .state
            .gate
            .spawn_maintenance(self.state.config.admission.maintenance_interval);

        let app = create_router(self.state).into_make_service_with_connect_info::<SocketAddr>();

        info!(address = %local_addr, "Gateway listening");

        let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();
        let graceful = axum::serve(listener, app).with_graceful_shutdown(async move {
            shutdown.await;
            let _ = signalled_tx.send(());
        })
        .into_future();

        let result = tokio::select! {
            result = graceful => result.map_err(|e| GatewayError::internal(e.to_string())),
            () = async {
                if signalled_rx.await.is_ok() {
                    tokio::time::sleep(grace).await;
                } else {
                    std::future::pending::<()>().await;
                }
            } => {
                warn!(grace_secs = grace.as_secs(), "Shutdown grace period elapsed, dropping connections");
                Ok(())
            }
        };

        maintenance.abort();
        info!("Gateway stopped");
        result
    }
}
