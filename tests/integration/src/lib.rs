//! Integration tests for the inference gateway
//!
//! This crate runs the real server against a wiremock backend and covers:
//! - Per-client admission and the 429 contract
//! - Retry and circuit breaker behavior seen through the HTTP surface
//! - Model catalog fallback
//! - Adaptive tightening of the upstream tier

pub mod helpers;
pub mod mock_upstream;

// Re-export commonly used items
pub use helpers::*;
pub use mock_upstream::*;

#[cfg(test)]
mod admission_tests;
#[cfg(test)]
mod catalog_tests;
#[cfg(test)]
mod resilience_tests;
