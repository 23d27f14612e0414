//! Routing and route confirmation endpoints

use axum::extract::{Path, State};
use serde::Serialize;
use tracing::info;

use crate::api::state::AppState;
use crate::api::types::{ApiError, ConfirmRouteRequest, ConfirmRouteResponse, Json, QueryRequest};
use crate::domain::router::{RouteDecision, RouteSource};
use crate::domain::workflow::WorkflowKind;

#[derive(Debug, Clone, Serialize)]
pub struct RouteResponse {
    pub route_id: String,
    pub confidence: f32,
    pub source: RouteSource,
    /// Workflow bound to the route; absent when unrouted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowKind>,
}

/// POST /v1/route
pub async fn route_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<RouteResponse>, ApiError> {
    let RouteDecision {
        route_id,
        confidence,
        source,
    } = state.router().route(&request.query).await?;

    let workflow = state.router().workflow_for(&route_id);

    Ok(Json(RouteResponse {
        route_id,
        confidence,
        source,
        workflow,
    }))
}

/// POST /v1/routes/{route_id}/confirm
pub async fn confirm_route(
    State(state): State<AppState>,
    Path(route_id): Path<String>,
    Json(request): Json<ConfirmRouteRequest>,
) -> Result<Json<ConfirmRouteResponse>, ApiError> {
    let example_count = match (request.query, request.embedding) {
        (Some(query), None) => state.router().confirm_query(&route_id, &query).await?,
        (None, Some(embedding)) => {
            state.index().check_vector(&embedding)?;
            state.router().confirm(&route_id, &embedding).await?
        }
        _ => {
            return Err(ApiError::bad_request(
                "Provide exactly one of 'query' or 'embedding'",
            ));
        }
    };

    info!(route_id = %route_id, example_count, "Route confirmed via API");

    Ok(Json(ConfirmRouteResponse {
        route_id,
        example_count,
    }))
}
