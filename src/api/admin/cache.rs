//! Semantic cache admin endpoints

use axum::extract::State;
use tracing::info;

use crate::api::state::AppState;
use crate::api::types::{
    ApiError, ClearCacheResponse, InvalidateRequest, InvalidateResponse, Json, StatsResponse,
    SweepResponse,
};

/// GET /admin/cache/stats
pub async fn cache_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state.cache().stats().await?;
    Ok(Json(stats.into()))
}

/// POST /admin/cache/sweep
pub async fn sweep_cache(State(state): State<AppState>) -> Result<Json<SweepResponse>, ApiError> {
    let deleted = state.cache().sweep().await?;
    Ok(Json(SweepResponse { deleted }))
}

/// DELETE /admin/cache
pub async fn clear_cache(
    State(state): State<AppState>,
) -> Result<Json<ClearCacheResponse>, ApiError> {
    let deleted = state.cache().clear().await?;
    info!(deleted, "Semantic cache cleared via admin API");
    Ok(Json(ClearCacheResponse { deleted }))
}

/// POST /admin/cache/invalidate
pub async fn invalidate_entry(
    State(state): State<AppState>,
    Json(request): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>, ApiError> {
    let invalidated = state.cache().invalidate(&request.query).await?;
    Ok(Json(InvalidateResponse { invalidated }))
}
