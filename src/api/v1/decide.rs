//! Decision endpoint

use std::time::Instant;

use axum::extract::State;
use tracing::{debug, info};

use crate::api::state::AppState;
use crate::api::types::{ApiError, Json, QueryRequest};
use crate::infrastructure::services::Decision;

/// POST /v1/decide
///
/// Answers from the semantic cache when a close enough query was seen,
/// otherwise runs the routed workflow (or the general agent).
pub async fn decide(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<Decision>, ApiError> {
    let start = Instant::now();
    debug!(query_len = request.query.len(), "Decide request");

    let decision = state.decisions().decide(&request.query).await?;

    info!(
        source = ?decision.source,
        route_id = %decision.route_id,
        fingerprint = %decision.fingerprint,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Decision made"
    );

    Ok(Json(decision))
}
