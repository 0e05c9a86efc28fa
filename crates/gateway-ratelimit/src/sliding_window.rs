//! Per-key sliding window rate limiter.
//!
//! Each key keeps an oldest-first log of admission timestamps. A check
//! trims entries that fell out of the trailing window from the front and
//! admits while the log is shorter than the limit.
//!
//! Memory: a key whose whole log has aged out holds no information, so
//! [`SlidingWindowLimiter::sweep`] drops it. Sweeps run lazily from
//! [`SlidingWindowLimiter::is_allowed`] at most once per window length and
//! can also be driven by a background task.

use dashmap::DashMap;
use gateway_core::RateLimitDecision;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Sliding window limiter keyed by client identifier
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_requests: u32,
    window: Duration,
    requests: DashMap<String, VecDeque<Instant>>,
    last_sweep: Mutex<Instant>,
}

impl SlidingWindowLimiter {
    /// Create a limiter admitting `max_requests` per `window` and key.
    ///
    /// A zero limit or window is raised to the smallest usable value.
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window: window.max(Duration::from_millis(1)),
            requests: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    /// Requests admitted per window
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.max_requests
    }

    /// Window length
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Check and record a request for `key`
    pub fn is_allowed(&self, key: &str) -> RateLimitDecision {
        let now = Instant::now();
        self.maybe_sweep(now);

        // The entry guard holds the shard lock, so trim + append is atomic per key
        let mut log = self.requests.entry(key.to_owned()).or_default();
        self.trim(&mut log, now);

        let count = log.len() as u32;
        if count < self.max_requests {
            log.push_back(now);
            return RateLimitDecision::allowed(
                self.max_requests,
                self.max_requests - (count + 1),
                now + self.window,
            );
        }

        let oldest = log.front().copied().unwrap_or(now);
        let reset_at = oldest + self.window;
        RateLimitDecision::denied(
            self.max_requests,
            reset_at,
            reset_at.saturating_duration_since(now),
        )
    }

    /// Requests currently counted for `key`
    #[must_use]
    pub fn current_count(&self, key: &str) -> u32 {
        let now = Instant::now();
        self.requests.get(key).map_or(0, |log| {
            log.iter()
                .filter(|&&at| now.saturating_duration_since(at) <= self.window)
                .count() as u32
        })
    }

    /// Number of keys with retained state
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.requests.len()
    }

    /// Forget all state for `key`
    pub fn remove(&self, key: &str) {
        self.requests.remove(key);
    }

    /// Drop every key whose log has fully aged out. Returns the number of
    /// keys removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        *self.last_sweep.lock() = now;

        let before = self.requests.len();
        self.requests.retain(|_, log| {
            self.trim(log, now);
            !log.is_empty()
        });
        let removed = before.saturating_sub(self.requests.len());

        if removed > 0 {
            debug!(
                removed = removed,
                remaining = self.requests.len(),
                "Swept idle rate limit keys"
            );
        }
        removed
    }

    fn maybe_sweep(&self, now: Instant) {
        let due = {
            let Some(mut last) = self.last_sweep.try_lock() else {
                return;
            };
            if now.saturating_duration_since(*last) < self.window {
                return;
            }
            *last = now;
            true
        };
        if due {
            self.sweep();
        }
    }

    fn trim(&self, log: &mut VecDeque<Instant>, now: Instant) {
        let Some(window_start) = now.checked_sub(self.window) else {
            return;
        };
        while log.front().is_some_and(|&at| at < window_start) {
            log.pop_front();
        }
    }
}
