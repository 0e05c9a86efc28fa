//! Shared application state.

use gateway_config::GatewayConfig;
use gateway_core::{GatewayError, GatewayResult};
use gateway_ratelimit::{AdmissionConfig, AdmissionGate};
use gateway_resilience::{CircuitBreakerConfig, RetryConfig};
use gateway_telemetry::{Metrics, MetricsConfig};
use gateway_upstream::{ModelCatalogCache, UpstreamClient, UpstreamConfig};
use std::sync::Arc;
use std::time::Instant;

/// State injected into every handler. All members are created once at
/// start-up and shared.
#[derive(Clone)]
pub struct AppState {
    /// Effective configuration
    pub config: Arc<GatewayConfig>,
    /// Admission gate
    pub gate: Arc<AdmissionGate>,
    /// Inference backend client
    pub upstream: UpstreamClient,
    /// Model catalog cache
    pub catalog: Arc<ModelCatalogCache>,
    /// Prometheus metrics
    pub metrics: Metrics,
    /// Process start
    pub started_at: Instant,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("upstream", &self.upstream)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Start building state
    #[must_use]
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::default()
    }

    /// Build all components from configuration
    ///
    /// # Errors
    /// Returns error if the upstream client or metrics cannot be created
    pub fn from_config(config: GatewayConfig) -> GatewayResult<Self> {
        Self::builder().config(config).build()
    }

    /// Paths classified as upstream-bound
    #[must_use]
    pub fn upstream_paths(&self) -> &[String] {
        &self.config.server.upstream_paths
    }
}

/// Builder for [`AppState`]. Components not supplied are derived from the
/// configuration.
#[derive(Default)]
pub struct AppStateBuilder {
    config: Option<GatewayConfig>,
    gate: Option<Arc<AdmissionGate>>,
    upstream: Option<UpstreamClient>,
    catalog: Option<Arc<ModelCatalogCache>>,
    metrics: Option<Metrics>,
}

impl AppStateBuilder {
    /// Set the configuration
    #[must_use]
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use an existing admission gate
    #[must_use]
    pub fn gate(mut self, gate: Arc<AdmissionGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Use an existing upstream client
    #[must_use]
    pub fn upstream(mut self, upstream: UpstreamClient) -> Self {
        self.upstream = Some(upstream);
        self
    }

    /// Use an existing catalog cache
    #[must_use]
    pub fn catalog(mut self, catalog: Arc<ModelCatalogCache>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Use an existing metrics registry
    #[must_use]
    pub fn metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the state
    ///
    /// # Errors
    /// Returns error if a derived component cannot be created
    pub fn build(self) -> GatewayResult<AppState> {
        let config = self.config.unwrap_or_default();

        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => Metrics::new(&MetricsConfig::default())
                .map_err(|e| GatewayError::internal(e.to_string()))?,
        };
        let gate = self
            .gate
            .unwrap_or_else(|| Arc::new(AdmissionGate::new(admission_config(&config))));
        let upstream = match self.upstream {
            Some(upstream) => upstream,
            None => UpstreamClient::with_metrics(upstream_config(&config), metrics.clone())?,
        };
        let catalog = self.catalog.unwrap_or_else(|| {
            Arc::new(ModelCatalogCache::new(upstream.clone(), config.catalog.ttl()))
        });

        metrics.set_adaptive_limit(gate.upstream_controller().current_limit());

        Ok(AppState {
            config: Arc::new(config),
            gate,
            upstream,
            catalog,
            metrics,
            started_at: Instant::now(),
        })
    }
}

/// Admission gate settings from configuration
#[must_use]
pub fn admission_config(config: &GatewayConfig) -> AdmissionConfig {
    let admission = &config.admission;
    AdmissionConfig {
        enabled: admission.enabled,
        global_requests_per_minute: admission.global_requests_per_minute,
        global_burst_multiplier: admission.global_burst_multiplier,
        per_client_requests_per_minute: admission.per_client_requests_per_minute,
        upstream_base_requests_per_minute: admission.upstream_base_requests_per_minute,
        window: admission.window,
        adjustment_interval: admission.adjustment_interval,
    }
}

/// Upstream client settings from configuration
#[must_use]
pub fn upstream_config(config: &GatewayConfig) -> UpstreamConfig {
    let upstream = &config.upstream;
    UpstreamConfig {
        base_url: upstream.base_url.clone(),
        timeout: upstream.timeout(),
        connect_timeout: upstream.connect_timeout(),
        pool_max_idle_per_host: upstream.pool_max_idle_per_host,
        retry: RetryConfig {
            max_attempts: upstream.max_retries,
            min_delay: upstream.backoff_min(),
            max_delay: upstream.backoff_max(),
            ..Default::default()
        },
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: config.resilience.circuit_breaker_threshold,
            reset_timeout: config.resilience.reset_timeout(),
        },
    }
}
