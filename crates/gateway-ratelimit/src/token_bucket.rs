//! Token bucket with continuous refill.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket used as the process-wide admission ceiling.
///
/// Refill, check and decrement happen under one lock, so two callers can
/// never both take the last token.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket.
    ///
    /// `refill_rate` is in tokens per second. Non-positive arguments fall
    /// back to 1.
    #[must_use]
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        let capacity = if capacity > 0.0 { capacity } else { 1.0 };
        let refill_rate = if refill_rate > 0.0 { refill_rate } else { 1.0 };
        Self {
            capacity,
            refill_rate,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Create a bucket refilling `requests_per_minute` tokens every minute
    #[must_use]
    pub fn per_minute(capacity: u32, requests_per_minute: u32) -> Self {
        Self::new(f64::from(capacity), f64::from(requests_per_minute) / 60.0)
    }

    /// Maximum number of tokens
    #[must_use]
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Tokens added per second
    #[must_use]
    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    fn refilled(&self, state: &BucketState, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        (state.tokens + elapsed * self.refill_rate).min(self.capacity)
    }

    /// Take `n` tokens if available; nothing is taken otherwise
    pub fn try_consume(&self, n: f64) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.tokens = self.refilled(&state, now);
        state.last_refill = now;

        if state.tokens >= n {
            state.tokens -= n;
            true
        } else {
            false
        }
    }

    /// Take a single token
    pub fn try_acquire(&self) -> bool {
        self.try_consume(1.0)
    }

    /// Time until `n` tokens would be available.
    ///
    /// Informational only, nothing is reserved and the bucket is not
    /// modified.
    #[must_use]
    pub fn estimated_wait(&self, n: f64) -> Duration {
        let state = self.state.lock();
        let tokens = self.refilled(&state, Instant::now());
        drop(state);

        if tokens >= n {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((n - tokens) / self.refill_rate)
        }
    }

    /// Tokens currently available
    #[must_use]
    pub fn available_tokens(&self) -> f64 {
        let state = self.state.lock();
        self.refilled(&state, Instant::now())
    }
}
