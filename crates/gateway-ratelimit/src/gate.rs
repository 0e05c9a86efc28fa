//! Admission gate composing the three rate-limit tiers.
//!
//! A request passes, in order:
//! 1. the process-wide token bucket,
//! 2. the per-client sliding window,
//! 3. for upstream-bound requests, the adaptive limiter keyed by client.
//!
//! The first tier that denies decides the response. Earlier tiers are not
//! refunded when a later one denies.

use crate::adaptive::{AdaptiveConfig, AdaptiveController};
use crate::sliding_window::SlidingWindowLimiter;
use crate::token_bucket::TokenBucket;
use gateway_core::{EndpointClass, RateLimitDecision};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Admission gate configuration
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// Disable to admit every request
    pub enabled: bool,
    /// Sustained process-wide requests per minute
    pub global_requests_per_minute: u32,
    /// Global bucket capacity as a multiple of the per-minute rate
    pub global_burst_multiplier: u32,
    /// Requests per minute for a single client
    pub per_client_requests_per_minute: u32,
    /// Starting per-client limit for upstream-bound requests
    pub upstream_base_requests_per_minute: u32,
    /// Window used by the per-client and adaptive limiters
    pub window: Duration,
    /// Minimum time between adaptive adjustments
    pub adjustment_interval: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            global_requests_per_minute: 60,
            global_burst_multiplier: 10,
            per_client_requests_per_minute: 60,
            upstream_base_requests_per_minute: 30,
            window: Duration::from_secs(60),
            adjustment_interval: Duration::from_secs(60),
        }
    }
}

/// Which tier denied a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionTier {
    /// Process-wide token bucket
    Global,
    /// Per-client sliding window
    Client,
    /// Adaptive upstream limiter
    Upstream,
}

impl AdmissionTier {
    /// Label used in logs and metrics
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Client => "client",
            Self::Upstream => "upstream",
        }
    }
}

/// Admission decision together with the tier that produced a denial
#[derive(Debug, Clone, Copy)]
pub struct AdmissionOutcome {
    /// The decision returned to the caller
    pub decision: RateLimitDecision,
    /// Denying tier, `None` when admitted
    pub denied_by: Option<AdmissionTier>,
}

/// Request admission façade shared by all handlers
#[derive(Debug)]
pub struct AdmissionGate {
    config: AdmissionConfig,
    global: TokenBucket,
    per_client: SlidingWindowLimiter,
    upstream: AdaptiveController,
}

impl AdmissionGate {
    /// Build the gate and its limiters
    #[must_use]
    pub fn new(config: AdmissionConfig) -> Self {
        let global_rpm = config.global_requests_per_minute.max(1);
        let capacity = global_rpm.saturating_mul(config.global_burst_multiplier.max(1));

        Self {
            global: TokenBucket::per_minute(capacity, global_rpm),
            per_client: SlidingWindowLimiter::new(
                config.per_client_requests_per_minute,
                config.window,
            ),
            upstream: AdaptiveController::new(AdaptiveConfig {
                base_limit: config.upstream_base_requests_per_minute,
                window: config.window,
                adjustment_interval: config.adjustment_interval,
                ..Default::default()
            }),
            config,
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(AdmissionConfig::default())
    }

    /// Decide whether a request from `client_key` may proceed
    pub fn check(&self, client_key: &str, class: EndpointClass) -> RateLimitDecision {
        self.evaluate(client_key, class).decision
    }

    /// Like [`check`](Self::check), also reporting the denying tier
    pub fn evaluate(&self, client_key: &str, class: EndpointClass) -> AdmissionOutcome {
        if !self.config.enabled {
            let limit = self.per_client.limit();
            let reset_at = Instant::now() + self.config.window;
            return AdmissionOutcome {
                decision: RateLimitDecision::allowed(limit, limit, reset_at),
                denied_by: None,
            };
        }

        if !self.global.try_acquire() {
            let wait = self.global.estimated_wait(1.0);
            let retry_after = Duration::from_secs(wait.as_secs_f64().ceil().max(1.0) as u64);
            debug!(
                client = %client_key,
                class = %class,
                retry_after_secs = retry_after.as_secs(),
                "Global admission limit reached"
            );
            return AdmissionOutcome {
                decision: RateLimitDecision::denied(
                    self.config.global_requests_per_minute.max(1),
                    Instant::now() + retry_after,
                    retry_after,
                ),
                denied_by: Some(AdmissionTier::Global),
            };
        }

        let client_decision = self.per_client.is_allowed(client_key);
        if !client_decision.allowed {
            debug!(client = %client_key, class = %class, "Per-client limit reached");
            return AdmissionOutcome {
                decision: client_decision,
                denied_by: Some(AdmissionTier::Client),
            };
        }

        if class == EndpointClass::Upstream {
            let upstream_decision = self.upstream.is_allowed(client_key);
            if !upstream_decision.allowed {
                debug!(
                    client = %client_key,
                    limit = upstream_decision.limit,
                    "Adaptive upstream limit reached"
                );
                return AdmissionOutcome {
                    decision: upstream_decision,
                    denied_by: Some(AdmissionTier::Upstream),
                };
            }
        }

        AdmissionOutcome {
            decision: client_decision,
            denied_by: None,
        }
    }

    /// Feed the outcome of an admitted request back into adaptive limiting.
    ///
    /// Only upstream-bound requests are counted.
    pub fn report_outcome(&self, class: EndpointClass, success: bool) {
        if class != EndpointClass::Upstream {
            return;
        }
        if success {
            self.upstream.record_success();
        } else {
            self.upstream.record_error();
        }
    }

    /// Reclaim idle per-client state in every tier
    pub fn sweep(&self) -> usize {
        self.per_client.sweep() + self.upstream.sweep()
    }

    /// Periodically sweep idle keys until the gate is dropped elsewhere and
    /// the task is aborted
    pub fn spawn_maintenance(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let gate = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                gate.sweep();
            }
        })
    }

    /// Gate configuration
    #[must_use]
    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Process-wide token bucket
    #[must_use]
    pub fn global_bucket(&self) -> &TokenBucket {
        &self.global
    }

    /// Per-client limiter
    #[must_use]
    pub fn per_client(&self) -> &SlidingWindowLimiter {
        &self.per_client
    }

    /// Adaptive limiter for upstream-bound requests
    #[must_use]
    pub fn upstream_controller(&self) -> &AdaptiveController {
        &self.upstream
    }
}
