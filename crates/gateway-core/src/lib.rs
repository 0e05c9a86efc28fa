//! # Gateway Core
//!
//! Core types and error handling for the inference admission gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - The error taxonomy shared by limiters, breaker and upstream client
//! - Endpoint classification
//! - Rate-limit decisions

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::{GatewayError, GatewayResult};
pub use types::{EndpointClass, RateLimitDecision};
