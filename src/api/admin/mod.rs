//! Admin API endpoints for inspecting and maintaining the engine

pub mod cache;
pub mod routes;

use axum::{
    routing::{delete, get, post},
    Router,
};

use super::state::AppState;

/// Create admin API router
pub fn create_admin_router() -> Router<AppState> {
    Router::new()
        // Route registry
        .route("/routes", get(routes::list_routes))
        // Semantic cache maintenance
        .route("/cache", delete(cache::clear_cache))
        .route("/cache/stats", get(cache::cache_stats))
        .route("/cache/sweep", post(cache::sweep_cache))
        .route("/cache/invalidate", post(cache::invalidate_entry))
}
