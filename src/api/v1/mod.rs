//! v1 decision API

pub mod cache;
pub mod decide;
pub mod routes;

use axum::{routing::post, Router};

use super::state::AppState;

/// Create v1 API router
pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/decide", post(decide::decide))
        .route("/route", post(routes::route_query))
        .route("/cache/lookup", post(cache::lookup))
        .route("/routes/{route_id}/confirm", post(routes::confirm_route))
}
