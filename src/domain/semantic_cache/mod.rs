//! Semantic cache domain models
//!
//! Vector-based caching that matches semantically similar queries
//! rather than requiring exact key matches.

mod config;
mod entry;

pub use config::SemanticCacheConfig;
pub use entry::{CacheEntry, CacheHit, CacheLookup, SemanticCacheStats, TtlClass};
