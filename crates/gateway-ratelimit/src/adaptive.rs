//! Adaptive limiter protecting the inference backend.
//!
//! Success and error outcomes are counted per adjustment cycle. On the first
//! check after a cycle ends, the per-key limit is scaled down by 20% when
//! more than 10% of outcomes were errors, or up by 20% (bounded by twice the
//! base limit) when fewer than 2% were.
//!
//! A rescale replaces the inner [`SlidingWindowLimiter`] with a fresh one,
//! so the window history of every key is dropped at that point.

use crate::sliding_window::SlidingWindowLimiter;
use arc_swap::ArcSwap;
use gateway_core::RateLimitDecision;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Adaptive limiter configuration
#[derive(Debug, Clone)]
pub struct AdaptiveConfig {
    /// Starting per-key limit per window
    pub base_limit: u32,
    /// Window of the inner sliding limiter
    pub window: Duration,
    /// Minimum time between adjustments
    pub adjustment_interval: Duration,
    /// Error rate above which the limit shrinks
    pub decrease_above: f64,
    /// Error rate below which the limit grows
    pub increase_below: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            base_limit: 30,
            window: Duration::from_secs(60),
            adjustment_interval: Duration::from_secs(60),
            decrease_above: 0.10,
            increase_below: 0.02,
        }
    }
}

#[derive(Debug)]
struct AdaptiveState {
    current_limit: u32,
    success_count: u64,
    error_count: u64,
    last_adjustment: Instant,
}

/// Sliding window limiter whose capacity follows upstream health
#[derive(Debug)]
pub struct AdaptiveController {
    config: AdaptiveConfig,
    limiter: ArcSwap<SlidingWindowLimiter>,
    state: Mutex<AdaptiveState>,
}

impl AdaptiveController {
    /// Create a controller starting at the base limit
    #[must_use]
    pub fn new(config: AdaptiveConfig) -> Self {
        let base_limit = config.base_limit.max(1);
        let config = AdaptiveConfig { base_limit, ..config };
        Self {
            limiter: ArcSwap::from_pointee(SlidingWindowLimiter::new(base_limit, config.window)),
            state: Mutex::new(AdaptiveState {
                current_limit: base_limit,
                success_count: 0,
                error_count: 0,
                last_adjustment: Instant::now(),
            }),
            config,
        }
    }

    /// Check and record a request for `key`, adjusting the limit first if a
    /// cycle has ended
    pub fn is_allowed(&self, key: &str) -> RateLimitDecision {
        self.adjust_limit();
        self.limiter.load().is_allowed(key)
    }

    /// Record a successful upstream request
    pub fn record_success(&self) {
        self.state.lock().success_count += 1;
    }

    /// Record a failed upstream request
    pub fn record_error(&self) {
        self.state.lock().error_count += 1;
    }

    /// Limit currently enforced
    #[must_use]
    pub fn current_limit(&self) -> u32 {
        self.state.lock().current_limit
    }

    /// Limit the controller started from
    #[must_use]
    pub fn base_limit(&self) -> u32 {
        self.config.base_limit
    }

    /// Snapshot of the current cycle
    #[must_use]
    pub fn stats(&self) -> AdaptiveStats {
        let state = self.state.lock();
        AdaptiveStats {
            base_limit: self.config.base_limit,
            current_limit: state.current_limit,
            success_count: state.success_count,
            error_count: state.error_count,
            tracked_keys: self.limiter.load().tracked_keys(),
        }
    }

    /// Reclaim idle keys in the inner limiter
    pub fn sweep(&self) -> usize {
        self.limiter.load().sweep()
    }

    fn adjust_limit(&self) {
        let now = Instant::now();
        let mut state = self.state.lock();

        if now.saturating_duration_since(state.last_adjustment) < self.config.adjustment_interval {
            return;
        }

        let total = state.success_count + state.error_count;
        if total == 0 {
            return;
        }

        let error_rate = state.error_count as f64 / total as f64;
        let current = u64::from(state.current_limit);
        let ceiling = u64::from(self.config.base_limit) * 2;

        let new_limit = if error_rate > self.config.decrease_above {
            // floor(current * 0.8), at least 1
            (current * 4 / 5).max(1)
        } else if error_rate < self.config.increase_below {
            // ceil(current * 1.2), at most twice the base
            ((current * 6 + 4) / 5).min(ceiling)
        } else {
            current
        };
        let new_limit = u32::try_from(new_limit).unwrap_or(u32::MAX);

        if new_limit != state.current_limit {
            if new_limit < state.current_limit {
                warn!(
                    error_rate = error_rate,
                    old_limit = state.current_limit,
                    new_limit = new_limit,
                    "High upstream error rate, reducing limit"
                );
            } else {
                info!(
                    error_rate = error_rate,
                    old_limit = state.current_limit,
                    new_limit = new_limit,
                    "Low upstream error rate, increasing limit"
                );
            }
            state.current_limit = new_limit;
            self.limiter
                .store(Arc::new(SlidingWindowLimiter::new(new_limit, self.config.window)));
        } else {
            debug!(error_rate = error_rate, limit = new_limit, "Adaptive limit unchanged");
        }

        state.success_count = 0;
        state.error_count = 0;
        state.last_adjustment = now;
    }
}

/// Adaptive controller statistics
#[derive(Debug, Clone)]
pub struct AdaptiveStats {
    /// Configured base limit
    pub base_limit: u32,
    /// Limit currently enforced
    pub current_limit: u32,
    /// Successes in the current cycle
    pub success_count: u64,
    /// Errors in the current cycle
    pub error_count: u64,
    /// Keys tracked by the inner limiter
    pub tracked_keys: usize,
}
