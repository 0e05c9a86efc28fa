//! Prometheus metrics.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Metrics configuration
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Prefix prepended to every metric name
    pub namespace: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            namespace: "gateway".to_string(),
        }
    }
}

/// Outcome label for admission decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionLabel {
    /// Request admitted
    Admitted,
    /// Denied by the global bucket
    DeniedGlobal,
    /// Denied by the per-client window
    DeniedClient,
    /// Denied by the adaptive upstream limiter
    DeniedUpstream,
}

impl AdmissionLabel {
    /// Label value
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admitted => "admitted",
            Self::DeniedGlobal => "denied_global",
            Self::DeniedClient => "denied_client",
            Self::DeniedUpstream => "denied_upstream",
        }
    }
}

/// Gateway metrics backed by a private registry
#[derive(Debug, Clone)]
pub struct Metrics {
    registry: Registry,
    admission_decisions: IntCounterVec,
    upstream_attempts: IntCounter,
    upstream_failures: IntCounterVec,
    circuit_open: IntGauge,
    adaptive_limit: IntGauge,
    catalog_size: IntGauge,
}

impl Metrics {
    /// Create and register all collectors.
    ///
    /// # Errors
    /// Returns error if a collector cannot be created or registered
    pub fn new(config: &MetricsConfig) -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let ns = config.namespace.as_str();

        let admission_decisions = IntCounterVec::new(
            Opts::new("admission_decisions_total", "Admission decisions by endpoint class and outcome")
                .namespace(ns),
            &["class", "outcome"],
        )?;
        let upstream_attempts = IntCounter::with_opts(
            Opts::new("upstream_attempts_total", "HTTP attempts sent to the inference backend")
                .namespace(ns),
        )?;
        let upstream_failures = IntCounterVec::new(
            Opts::new("upstream_failures_total", "Failed upstream calls by error type").namespace(ns),
            &["error_type"],
        )?;
        let circuit_open = IntGauge::with_opts(
            Opts::new("circuit_breaker_open", "1 while the upstream circuit rejects calls")
                .namespace(ns),
        )?;
        let adaptive_limit = IntGauge::with_opts(
            Opts::new("adaptive_limit", "Per-client limit currently enforced for upstream requests")
                .namespace(ns),
        )?;
        let catalog_size = IntGauge::with_opts(
            Opts::new("model_catalog_size", "Models in the cached upstream catalog").namespace(ns),
        )?;

        registry.register(Box::new(admission_decisions.clone()))?;
        registry.register(Box::new(upstream_attempts.clone()))?;
        registry.register(Box::new(upstream_failures.clone()))?;
        registry.register(Box::new(circuit_open.clone()))?;
        registry.register(Box::new(adaptive_limit.clone()))?;
        registry.register(Box::new(catalog_size.clone()))?;

        Ok(Self {
            registry,
            admission_decisions,
            upstream_attempts,
            upstream_failures,
            circuit_open,
            adaptive_limit,
            catalog_size,
        })
    }

    /// Count one admission decision
    pub fn record_admission(&self, class: &str, outcome: AdmissionLabel) {
        self.admission_decisions
            .with_label_values(&[class, outcome.as_str()])
            .inc();
    }

    /// Count one HTTP attempt against the backend
    pub fn record_upstream_attempt(&self) {
        self.upstream_attempts.inc();
    }

    /// Count one failed upstream call
    pub fn record_upstream_failure(&self, error_type: &str) {
        self.upstream_failures.with_label_values(&[error_type]).inc();
    }

    /// Publish circuit breaker state
    pub fn set_circuit_open(&self, open: bool) {
        self.circuit_open.set(i64::from(open));
    }

    /// Publish the adaptive limit
    pub fn set_adaptive_limit(&self, limit: u32) {
        self.adaptive_limit.set(i64::from(limit));
    }

    /// Publish the catalog size
    pub fn set_catalog_size(&self, models: usize) {
        self.catalog_size.set(models as i64);
    }

    /// Underlying registry
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in the Prometheus text exposition format.
    ///
    /// # Errors
    /// Returns error if encoding fails
    pub fn gather(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| MetricsError::Encode(e.to_string()))
    }
}

/// Metrics error
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Collector creation or registration failed
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
    /// Output was not valid UTF-8
    #[error("Failed to encode metrics: {0}")]
    Encode(String),
}
