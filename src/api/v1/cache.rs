//! Semantic cache lookup endpoint

use axum::extract::State;

use crate::api::state::AppState;
use crate::api::types::{ApiError, CacheLookupResponse, Json, QueryRequest};

/// POST /v1/cache/lookup
///
/// Read-only from the caller's view; a hit still bumps the entry's hit
/// count.
pub async fn lookup(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<CacheLookupResponse>, ApiError> {
    let lookup = state.cache().lookup(&request.query).await?;
    Ok(Json(lookup.into()))
}
