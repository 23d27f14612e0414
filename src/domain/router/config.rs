//! Semantic router configuration

use serde::{Deserialize, Serialize};

use super::definition::PatternSpec;
use crate::domain::workflow::WorkflowKind;

/// Configuration for the semantic router
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Minimum similarity for a vector route match (0.0 to 1.0)
    ///
    /// Looser than the cache threshold: a wrong route costs a slower
    /// answer, a wrong cache hit costs a wrong one.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Namespace for route records in the vector store
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_similarity_threshold() -> f32 {
    0.85
}

fn default_namespace() -> String {
    "route".to_string()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            namespace: default_namespace(),
        }
    }
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}

/// A route as declared in configuration: seed example texts, not vectors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSpec {
    pub route_id: String,
    pub workflow: WorkflowKind,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub fallback_patterns: Vec<PatternSpec>,
}
