//! # Gateway Telemetry
//!
//! Observability for the inference admission gateway.
//!
//! This crate provides:
//! - Structured logging bootstrap (`tracing-subscriber`, text or JSON)
//! - Prometheus metrics for admission, upstream calls and breaker state

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;
pub mod metrics;

// Re-export main types
pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingError};
pub use metrics::{AdmissionLabel, Metrics, MetricsConfig, MetricsError};
