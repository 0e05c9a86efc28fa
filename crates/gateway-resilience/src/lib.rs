//! # Gateway Resilience
//!
//! Resilience patterns guarding calls to the inference backend:
//! - Circuit breaker for failing fast while the upstream is down
//! - Retry policy with exponential backoff for transport failures
//!
//! The two compose as decorators around any outbound call, breaker
//! outermost, so an open circuit never consumes a retry budget:
//!
//! ```ignore
//! breaker.execute(|| retry.execute(|| send())).await
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod circuit_breaker;
pub mod retry;

// Re-export main types
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use retry::{RetryConfig, RetryPolicy, RetryPolicyBuilder, RetryResult};
