//! # Gateway Rate Limiting
//!
//! Admission control for the inference gateway. Three limiters are layered
//! by [`AdmissionGate`]:
//! - [`TokenBucket`] caps aggregate throughput with bounded bursts
//! - [`SlidingWindowLimiter`] caps each client over a trailing window
//! - [`AdaptiveController`] shrinks or grows the per-client budget for
//!   upstream-bound requests based on observed upstream errors

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod adaptive;
pub mod gate;
pub mod sliding_window;
pub mod token_bucket;

pub use adaptive::{AdaptiveConfig, AdaptiveController, AdaptiveStats};
pub use gate::{AdmissionConfig, AdmissionGate, AdmissionOutcome, AdmissionTier};
pub use sliding_window::SlidingWindowLimiter;
pub use token_bucket::TokenBucket;
