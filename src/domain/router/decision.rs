//! Route decisions

use serde::{Deserialize, Serialize};

/// Route id returned when neither examples nor patterns matched
pub const UNROUTED: &str = "unrouted";

/// Which stage of the router produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    /// Nearest example above the router threshold
    Vector,
    /// A fallback pattern matched
    Pattern,
    /// Nothing matched; the caller must classify with a model
    Unrouted,
}

/// Outcome of routing one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub route_id: String,
    /// Similarity of the best example of the chosen route (0.0 if none)
    pub confidence: f32,
    pub source: RouteSource,
}

impl RouteDecision {
    pub fn vector(route_id: impl Into<String>, confidence: f32) -> Self {
        Self {
            route_id: route_id.into(),
            confidence,
            source: RouteSource::Vector,
        }
    }

    pub fn pattern(route_id: impl Into<String>, confidence: f32) -> Self {
        Self {
            route_id: route_id.into(),
            confidence,
            source: RouteSource::Pattern,
        }
    }

    pub fn unrouted() -> Self {
        Self {
            route_id: UNROUTED.to_string(),
            confidence: 0.0,
            source: RouteSource::Unrouted,
        }
    }

    pub fn is_routed(&self) -> bool {
        self.source != RouteSource::Unrouted
    }
}
