//! Circuit breaker pattern implementation.
//!
//! The circuit breaker prevents retry storms against a downed upstream by
//! failing calls fast once enough failures accumulate, and lets a probe
//! through again after a cooldown.
//!
//! There is no dedicated half-open budget: once the reset timeout has
//! elapsed the breaker simply stops reporting itself open, and the outcome
//! of the next call decides. A failure re-arms the timeout immediately
//! (the count is still past the threshold); a success resets the count.

use gateway_core::{GatewayError, GatewayResult};
use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally
    Closed,
    /// Circuit is open, requests are rejected
    Open,
    /// Threshold reached but cooldown elapsed; the next call is a probe
    HalfOpen,
}

impl CircuitState {
    /// Label used in logs and metrics
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of failures before opening the circuit
    pub failure_threshold: u32,
    /// Time after the last failure before a probe is allowed
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Default)]
struct BreakerState {
    failure_count: u32,
    last_failure: Option<Instant>,
}

/// Circuit breaker guarding a single upstream
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Upstream identifier
    name: String,
    /// Configuration
    config: CircuitBreakerConfig,
    /// Failure bookkeeping, mutated under one lock
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config: CircuitBreakerConfig {
                failure_threshold: config.failure_threshold.max(1),
                ..config
            },
            state: Mutex::new(BreakerState::default()),
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Get the upstream name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Whether calls should currently fail fast
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Get the current state
    #[must_use]
    pub fn state(&self) -> CircuitState {
        let state = self.state.lock();
        self.derive_state(&state, Instant::now())
    }

    fn derive_state(&self, state: &BreakerState, now: Instant) -> CircuitState {
        if state.failure_count < self.config.failure_threshold {
            return CircuitState::Closed;
        }
        match state.last_failure {
            Some(at) if now.saturating_duration_since(at) < self.config.reset_timeout => {
                CircuitState::Open
            }
            _ => CircuitState::HalfOpen,
        }
    }

    /// Check if the circuit allows requests
    ///
    /// # Errors
    /// Returns `GatewayError::CircuitOpen` if circuit is open
    pub fn check(&self) -> GatewayResult<()> {
        if self.is_open() {
            debug!(upstream = %self.name, "Circuit breaker rejected call");
            Err(GatewayError::circuit_open(&self.name))
        } else {
            Ok(())
        }
    }

    /// Record a successful request
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        let was_tripped = state.failure_count >= self.config.failure_threshold;
        state.failure_count = 0;
        drop(state);

        if was_tripped {
            info!(upstream = %self.name, "Circuit breaker closed");
        }
    }

    /// Record a failed request
    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure = Some(Instant::now());
        let failures = state.failure_count;
        drop(state);

        if failures == self.config.failure_threshold {
            warn!(
                upstream = %self.name,
                failures = failures,
                reset_timeout_secs = self.config.reset_timeout.as_secs(),
                "Circuit breaker opened"
            );
        } else if failures > self.config.failure_threshold {
            warn!(
                upstream = %self.name,
                failures = failures,
                "Circuit breaker probe failed, reopening"
            );
        } else {
            debug!(
                upstream = %self.name,
                failures = failures,
                threshold = self.config.failure_threshold,
                "Circuit breaker failure recorded"
            );
        }
    }

    /// Run `operation` behind the breaker.
    ///
    /// An open circuit fails with `CircuitOpen` before `operation` is
    /// polled. Successes close the circuit, and so does a 2xx answer whose
    /// body could not be decoded ([`GatewayError::is_success_status`]).
    /// Availability failures ([`GatewayError::counts_as_failure`]) count
    /// towards the threshold. Any other error leaves the breaker untouched.
    ///
    /// # Errors
    /// Returns `CircuitOpen` or the operation's own error
    pub async fn execute<F, Fut, T>(&self, operation: F) -> GatewayResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        self.check()?;

        let result = operation().await;
        match &result {
            Ok(_) => self.record_success(),
            Err(error) if error.is_success_status() => self.record_success(),
            Err(error) if error.counts_as_failure() => self.record_failure(),
            Err(_) => {}
        }
        result
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        let mut state = self.state.lock();
        *state = BreakerState::default();
        drop(state);
        info!(upstream = %self.name, "Circuit breaker reset");
    }

    /// Force the circuit open (for testing or manual intervention)
    pub fn force_open(&self) {
        let mut state = self.state.lock();
        state.failure_count = state.failure_count.max(self.config.failure_threshold);
        state.last_failure = Some(Instant::now());
        drop(state);
        warn!(upstream = %self.name, "Circuit breaker forced open");
    }

    /// Get current statistics
    #[must_use]
    pub fn stats(&self) -> CircuitBreakerStats {
        let now = Instant::now();
        let state = self.state.lock();
        CircuitBreakerStats {
            state: self.derive_state(&state, now),
            failure_count: state.failure_count,
            threshold: self.config.failure_threshold,
            since_last_failure: state
                .last_failure
                .map(|at| now.saturating_duration_since(at)),
        }
    }
}

/// Circuit breaker statistics
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    /// Current state
    pub state: CircuitState,
    /// Consecutive failures since the last success
    pub failure_count: u32,
    /// Failures needed to open
    pub threshold: u32,
    /// Time since the last recorded failure
    pub since_last_failure: Option<Duration>,
}
