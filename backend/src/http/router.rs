//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (CORS, compression, tracing),
//! and creates the axum router ready for serving.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Default request body limit (document uploads).
pub const DEFAULT_BODY_LIMIT: usize = 50 * 1024 * 1024;

/// Create the main application router with the default body limit.
pub fn create_router(state: AppState) -> Router {
    create_router_with_limit(state, DEFAULT_BODY_LIMIT)
}

/// Create the main application router with all routes and middleware.
pub fn create_router_with_limit(state: AppState, body_limit: usize) -> Router {
    // The page is served from elsewhere.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Catalog
        .route("/sites", get(handlers::list_sites))
        .route("/sites/manual", post(handlers::submit_manual_site))
        .route("/sites/extract", post(handlers::extract_sites))
        .route("/sites/export", get(handlers::export_sites))
        // Per-site actions
        .route("/sites/{index}/analysis", post(handlers::toggle_analysis))
        .route("/sites/{index}/preview", post(handlers::toggle_preview))
        .route("/sites/{index}/download", post(handlers::download_site))
        .route("/sites/{index}/locate", post(handlers::locate_site))
        // Observers
        .route("/actions", get(handlers::list_actions))
        .route("/events", get(handlers::stream_events));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_v1)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
