use super::handlers;
use super::state::AppState;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

/// Create the router: the synthesis socket plus health and stats
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Synthesis connections
        .route("/", get(handlers::synthesize_ws))
        // Monitoring
        .route("/health", get(handlers::health_check))
        .route("/stats", get(handlers::get_stats))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
