//! Configuration types.

use gateway_telemetry::LogFormat;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;
use validator::{Validate, ValidationError};

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP listener
    #[validate(nested)]
    pub server: ServerSettings,
    /// Inference backend
    #[validate(nested)]
    pub upstream: UpstreamSettings,
    /// Request admission
    #[validate(nested)]
    pub admission: AdmissionSettings,
    /// Circuit breaker
    #[validate(nested)]
    pub resilience: ResilienceSettings,
    /// Model catalog cache
    #[validate(nested)]
    pub catalog: CatalogSettings,
    /// Logging
    #[validate(nested)]
    pub logging: LoggingSettings,
}

impl GatewayConfig {
    /// Combinations that are accepted but probably unintended
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.upstream.backoff_max_seconds < self.upstream.backoff_min_seconds {
            warnings.push(format!(
                "upstream.backoff_max_seconds ({}) is below backoff_min_seconds ({}), using the minimum as a fixed delay",
                self.upstream.backoff_max_seconds, self.upstream.backoff_min_seconds
            ));
        }
        if self.admission.per_client_requests_per_minute > self.admission.global_requests_per_minute
            && self.admission.global_burst_multiplier <= 1
        {
            warnings.push(
                "admission: one client can exhaust the global budget without bursting".to_string(),
            );
        }
        if self.admission.upstream_base_requests_per_minute
            > self.admission.per_client_requests_per_minute
        {
            warnings.push(format!(
                "admission.upstream_base_requests_per_minute ({}) exceeds the per-client limit ({}) and only takes effect after it",
                self.admission.upstream_base_requests_per_minute,
                self.admission.per_client_requests_per_minute
            ));
        }
        if !self.admission.enabled {
            warnings.push("admission control is disabled, every request will be admitted".to_string());
        }

        warnings
    }

    /// Log every warning from [`GatewayConfig::warnings`]
    pub fn log_warnings(&self) {
        for warning in self.warnings() {
            warn!(warning = %warning, "Configuration warning");
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address
    #[validate(length(min = 1))]
    pub host: String,
    /// Bind port
    #[validate(range(min = 1))]
    pub port: u16,
    /// Paths whose requests count as upstream-bound
    pub upstream_paths: Vec<String>,
    /// Grace period for in-flight requests on shutdown
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            upstream_paths: vec!["/chat".to_string()],
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Inference backend settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct UpstreamSettings {
    /// Backend base URL
    #[validate(url)]
    pub base_url: String,
    /// Total time allowed for one attempt
    #[validate(range(min = 1, max = 3600))]
    pub timeout_seconds: u64,
    /// Time allowed to connect
    #[validate(range(min = 1, max = 300))]
    pub connect_timeout_seconds: u64,
    /// Idle connections kept per host
    pub pool_max_idle_per_host: usize,
    /// Total attempts per call, including the first
    #[validate(range(min = 1, max = 10))]
    pub max_retries: u32,
    /// Delay before the first retry
    pub backoff_min_seconds: u64,
    /// Upper bound for retry delays
    pub backoff_max_seconds: u64,
    /// Model used when a chat request names none
    #[validate(length(min = 1))]
    pub default_model: String,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            timeout_seconds: 120,
            connect_timeout_seconds: 10,
            pool_max_idle_per_host: 32,
            max_retries: 3,
            backoff_min_seconds: 4,
            backoff_max_seconds: 10,
            default_model: "llama3".to_string(),
        }
    }
}

impl UpstreamSettings {
    /// Per-attempt timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Connect timeout
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Minimum retry delay
    #[must_use]
    pub fn backoff_min(&self) -> Duration {
        Duration::from_secs(self.backoff_min_seconds)
    }

    /// Maximum retry delay
    #[must_use]
    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_seconds)
    }
}

/// Admission control settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AdmissionSettings {
    /// Disable to admit everything
    pub enabled: bool,
    /// Sustained process-wide rate
    #[validate(range(min = 1))]
    pub global_requests_per_minute: u32,
    /// Global burst capacity as a multiple of the per-minute rate
    #[validate(range(min = 1, max = 100))]
    pub global_burst_multiplier: u32,
    /// Per-client rate
    #[validate(range(min = 1))]
    pub per_client_requests_per_minute: u32,
    /// Starting per-client rate for upstream-bound requests
    #[validate(range(min = 1))]
    pub upstream_base_requests_per_minute: u32,
    /// Sliding window length
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    /// Minimum time between adaptive adjustments
    #[serde(with = "humantime_serde")]
    pub adjustment_interval: Duration,
    /// How often idle client state is swept
    #[serde(with = "humantime_serde")]
    pub maintenance_interval: Duration,
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            global_requests_per_minute: 60,
            global_burst_multiplier: 10,
            per_client_requests_per_minute: 60,
            upstream_base_requests_per_minute: 30,
            window: Duration::from_secs(60),
            adjustment_interval: Duration::from_secs(60),
            maintenance_interval: Duration::from_secs(300),
        }
    }
}

/// Circuit breaker settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ResilienceSettings {
    /// Consecutive failures that open the circuit
    #[validate(range(min = 1))]
    pub circuit_breaker_threshold: u32,
    /// How long an open circuit rejects calls
    #[validate(range(min = 1))]
    pub circuit_breaker_reset_timeout_seconds: u64,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_timeout_seconds: 60,
        }
    }
}

impl ResilienceSettings {
    /// Open-circuit duration
    #[must_use]
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.circuit_breaker_reset_timeout_seconds)
    }
}

/// Model catalog cache settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CatalogSettings {
    /// Snapshot lifetime
    pub model_cache_ttl_seconds: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            model_cache_ttl_seconds: 300,
        }
    }
}

impl CatalogSettings {
    /// Snapshot lifetime
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.model_cache_ttl_seconds)
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level, overridden by `RUST_LOG`
    #[validate(custom(function = "validate_log_level"))]
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    if LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        Ok(())
    } else {
        Err(ValidationError::new("log_level"))
    }
}
