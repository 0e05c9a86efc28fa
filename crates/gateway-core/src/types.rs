//! Admission types shared between the limiters and the HTTP layer.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Endpoint class used to pick the admission tiers for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EndpointClass {
    /// Any request that does not reach the inference backend
    #[default]
    General,
    /// Requests that call into the inference backend
    Upstream,
}

impl EndpointClass {
    /// Classify a request path against the list of upstream-bound paths
    #[must_use]
    pub fn from_path<S: AsRef<str>>(path: &str, upstream_paths: &[S]) -> Self {
        if upstream_paths.iter().any(|p| p.as_ref() == path) {
            Self::Upstream
        } else {
            Self::General
        }
    }

    /// Label used in logs and metrics
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Upstream => "upstream",
        }
    }
}

impl fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request is admitted
    pub allowed: bool,
    /// Limit of the limiter that produced this decision
    pub limit: u32,
    /// Admissions left in the current window
    pub remaining: u32,
    /// When the window resets
    pub reset_at: Instant,
    /// How long to wait before retrying, set on denials
    pub retry_after: Option<Duration>,
}

impl RateLimitDecision {
    /// Build an admitting decision
    #[must_use]
    pub fn allowed(limit: u32, remaining: u32, reset_at: Instant) -> Self {
        Self {
            allowed: true,
            limit,
            remaining,
            reset_at,
            retry_after: None,
        }
    }

    /// Build a denying decision
    #[must_use]
    pub fn denied(limit: u32, reset_at: Instant, retry_after: Duration) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: 0,
            reset_at,
            retry_after: Some(retry_after),
        }
    }

    /// `Retry-After` value in whole seconds, rounded up
    #[must_use]
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.retry_after.map(ceil_secs)
    }

    /// Reset time as a unix timestamp in seconds, for `X-RateLimit-Reset`
    #[must_use]
    pub fn reset_unix_timestamp(&self) -> i64 {
        let until_reset = self.reset_at.saturating_duration_since(Instant::now());
        Utc::now().timestamp() + ceil_secs(until_reset) as i64
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
