//! # Gateway Server
//!
//! Thin axum layer over the admission and upstream crates.
//!
//! This crate provides:
//! - Client identification from proxy headers or the peer address
//! - Admission middleware implementing the 429 contract and rate-limit headers
//! - Health, metrics, model listing and chat endpoints
//! - Graceful shutdown on SIGINT/SIGTERM

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod state;

// Re-export main types
pub use error::ApiError;
pub use extractors::ClientIp;
pub use routes::create_router;
pub use server::{Server, ServerConfig};
pub use state::{AppState, AppStateBuilder};
