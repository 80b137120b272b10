//! Router configuration for the web server.

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/extract", get(handlers::api_extract))
        .route("/api/platforms", get(handlers::api_platforms))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
