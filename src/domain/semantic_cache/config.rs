//! Semantic cache configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::TtlClass;

/// Configuration for semantic caching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticCacheConfig {
    /// Whether semantic caching is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Similarity threshold for cache hits (0.0 to 1.0)
    /// Higher values require more similar queries
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Number of nearest neighbors fetched per lookup
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Time-to-live for `volatile` entries in seconds
    #[serde(default = "default_volatile_ttl_secs")]
    pub volatile_ttl_secs: u64,

    /// Time-to-live for `standard` entries in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Time-to-live for `durable` entries in seconds
    #[serde(default = "default_durable_ttl_secs")]
    pub durable_ttl_secs: u64,

    /// Namespace for cache entries in the vector store
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_enabled() -> bool {
    true
}

fn default_similarity_threshold() -> f32 {
    0.92
}

fn default_top_k() -> usize {
    5
}

fn default_volatile_ttl_secs() -> u64 {
    300
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_durable_ttl_secs() -> u64 {
    86_400
}

fn default_namespace() -> String {
    "cache".to_string()
}

impl Default for SemanticCacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            similarity_threshold: default_similarity_threshold(),
            top_k: default_top_k(),
            volatile_ttl_secs: default_volatile_ttl_secs(),
            ttl_secs: default_ttl_secs(),
            durable_ttl_secs: default_durable_ttl_secs(),
            namespace: default_namespace(),
        }
    }
}

impl SemanticCacheConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the TTL for an entry class
    pub fn ttl_for(&self, class: TtlClass) -> Duration {
        match class {
            TtlClass::Volatile => Duration::from_secs(self.volatile_ttl_secs),
            TtlClass::Standard => Duration::from_secs(self.ttl_secs),
            TtlClass::Durable => Duration::from_secs(self.durable_ttl_secs),
        }
    }

    /// Set whether caching is enabled
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the similarity threshold
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the number of neighbors fetched per lookup
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Set the TTL for an entry class
    pub fn with_ttl(mut self, class: TtlClass, ttl: Duration) -> Self {
        match class {
            TtlClass::Volatile => self.volatile_ttl_secs = ttl.as_secs(),
            TtlClass::Standard => self.ttl_secs = ttl.as_secs(),
            TtlClass::Durable => self.durable_ttl_secs = ttl.as_secs(),
        }
        self
    }

    /// Set the namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}
