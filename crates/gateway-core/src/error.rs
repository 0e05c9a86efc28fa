//! Error types for the gateway.
//!
//! Every failure path in the admission and upstream layers returns a
//! [`GatewayError`]; nothing in the core terminates the process.

use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the gateway crates
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway error taxonomy
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Request rejected by a rate limiter
    #[error("Rate limit exceeded")]
    AdmissionDenied {
        /// Suggested delay before retrying
        retry_after: Option<Duration>,
    },

    /// Upstream presumed down, call rejected without a network attempt
    #[error("Circuit breaker is open for {upstream}: service temporarily unavailable")]
    CircuitOpen {
        /// Upstream identifier
        upstream: String,
    },

    /// Transport failures exhausted the retry budget
    #[error("Upstream unavailable after {attempts} attempt(s): {message}")]
    UpstreamUnavailable {
        /// Attempts made before giving up
        attempts: u32,
        /// Last transport error
        message: String,
    },

    /// Application-level error status returned by the upstream
    #[error("Upstream returned HTTP {status}: {body}")]
    UpstreamHttp {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Upstream endpoint does not exist
    #[error("Upstream endpoint not found: {path}")]
    NotFound {
        /// Requested path
        path: String,
    },

    /// A single attempt failed at the transport level
    #[error("Transport error: {message}")]
    Transport {
        /// Error description
        message: String,
        /// Whether the attempt hit the request timeout
        timed_out: bool,
    },

    /// Upstream answered 2xx with a body that could not be decoded
    #[error("Invalid upstream response: {message}")]
    InvalidResponse {
        /// Decoding error
        message: String,
    },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error description
        message: String,
    },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal {
        /// Error description
        message: String,
    },
}

impl GatewayError {
    /// Create an admission-denied error
    #[must_use]
    pub fn admission_denied(retry_after: Option<Duration>) -> Self {
        Self::AdmissionDenied { retry_after }
    }

    /// Create a circuit-open error
    #[must_use]
    pub fn circuit_open(upstream: impl Into<String>) -> Self {
        Self::CircuitOpen {
            upstream: upstream.into(),
        }
    }

    /// Create an upstream-unavailable error
    #[must_use]
    pub fn upstream_unavailable(attempts: u32, message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            attempts,
            message: message.into(),
        }
    }

    /// Create an upstream HTTP error
    #[must_use]
    pub fn upstream_http(status: u16, body: impl Into<String>) -> Self {
        Self::UpstreamHttp {
            status,
            body: body.into(),
        }
    }

    /// Create a not-found error
    #[must_use]
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a connection-level transport error
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            timed_out: false,
        }
    }

    /// Create a timeout transport error
    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self::Transport {
            message: format!("request timed out after {after:?}"),
            timed_out: true,
        }
    }

    /// Create an invalid-response error
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether a retry loop may attempt the operation again.
    ///
    /// Only transport failures qualify; status codes from the upstream are
    /// surfaced immediately.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Whether this error is an availability signal for a circuit breaker
    #[must_use]
    pub fn counts_as_failure(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::UpstreamUnavailable { .. }
        )
    }

    /// Whether the upstream answered with a 2xx status.
    ///
    /// An undecodable success body still proves the backend is healthy.
    #[must_use]
    pub fn is_success_status(&self) -> bool {
        matches!(self, Self::InvalidResponse { .. })
    }

    /// Whether the caller may retry later
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::AdmissionDenied { .. }
                | Self::CircuitOpen { .. }
                | Self::UpstreamUnavailable { .. }
                | Self::Transport { .. }
        )
    }

    /// HTTP status code to report to the end client
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::AdmissionDenied { .. } => 429,
            Self::CircuitOpen { .. } | Self::UpstreamUnavailable { .. } => 503,
            Self::Transport { timed_out: true, .. } => 504,
            Self::UpstreamHttp { .. }
            | Self::NotFound { .. }
            | Self::Transport { .. }
            | Self::InvalidResponse { .. } => 502,
            Self::Configuration { .. } | Self::Internal { .. } => 500,
        }
    }

    /// Suggested retry delay, if any
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::AdmissionDenied { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Stable machine-readable error type
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::AdmissionDenied { .. } => "rate_limit_exceeded",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::UpstreamHttp { .. } => "upstream_error",
            Self::NotFound { .. } => "upstream_not_found",
            Self::Transport { .. } => "transport_error",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::Configuration { .. } => "configuration_error",
            Self::Internal { .. } => "internal_error",
        }
    }
}
