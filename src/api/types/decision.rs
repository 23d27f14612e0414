//! Bodies of the decision, cache and route endpoints

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::router::RouteSummary;
use crate::domain::semantic_cache::{CacheLookup, SemanticCacheStats};

/// Body shared by every endpoint that takes a raw query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// Result of `POST /v1/cache/lookup`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheLookupResponse {
    pub hit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_count: Option<u64>,
}

impl From<CacheLookup> for CacheLookupResponse {
    fn from(lookup: CacheLookup) -> Self {
        match lookup {
            CacheLookup::Hit(hit) => Self {
                hit: true,
                similarity: Some(hit.similarity),
                fingerprint: Some(hit.entry.fingerprint().to_string()),
                payload: Some(hit.entry.response_payload().clone()),
                hit_count: Some(hit.entry.hit_count()),
            },
            CacheLookup::Miss => Self {
                hit: false,
                similarity: None,
                fingerprint: None,
                payload: None,
                hit_count: None,
            },
        }
    }
}

/// Confirmation of a routed query; exactly one of the fields is set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfirmRouteRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmRouteResponse {
    pub route_id: String,
    pub example_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutesResponse {
    pub routes: Vec<RouteSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: SemanticCacheStats,
    pub hit_rate: f32,
}

impl From<SemanticCacheStats> for StatsResponse {
    fn from(stats: SemanticCacheStats) -> Self {
        let hit_rate = stats.hit_rate();
        Self { stats, hit_rate }
    }
}

pub type InvalidateRequest = QueryRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidateResponse {
    pub invalidated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearCacheResponse {
    pub deleted: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepResponse {
    pub deleted: usize,
}
