//! Route definitions for the gateway API.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{handlers, middleware, state::AppState};

/// Create the main API router.
///
/// Admission runs innermost so that its rate-limit headers and outcome
/// reporting see the handler's response directly.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Exempt from admission
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        // Model catalog
        .route("/api/models", get(handlers::list_models))
        .route("/api/models/pull", post(handlers::pull_model))
        // Inference
        .route("/chat", post(handlers::chat))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::admission_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
