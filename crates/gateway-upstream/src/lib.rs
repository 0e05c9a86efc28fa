//! # Gateway Upstream
//!
//! Access to the inference backend (an Ollama-style HTTP API):
//! - [`UpstreamClient`] sends requests through the circuit breaker and the
//!   retry policy
//! - [`ModelCatalogCache`] keeps a TTL-bounded copy of the installed models
//!   and falls back to the last good list when the backend is unreachable

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod client;

pub use catalog::{parse_model_names, ModelCatalogCache, POPULAR_MODELS};
pub use client::{response_text, ChatMessage, UpstreamClient, UpstreamConfig};
