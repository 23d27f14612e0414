//! Route registry admin endpoints

use axum::extract::State;

use crate::api::state::AppState;
use crate::api::types::{Json, RoutesResponse};

/// GET /admin/routes
pub async fn list_routes(State(state): State<AppState>) -> Json<RoutesResponse> {
    Json(RoutesResponse {
        routes: state.router().routes(),
    })
}
