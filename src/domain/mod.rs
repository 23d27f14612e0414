//! Domain layer - Core decision types and the seams to external systems

pub mod cache;
pub mod clock;
pub mod embedding;
pub mod error;
pub mod fingerprint;
pub mod router;
pub mod semantic_cache;
pub mod vector_store;
pub mod workflow;

pub use cache::{Cache, CacheExt, ToolKey};
pub use clock::{Clock, SystemClock};
pub use embedding::{cosine_similarity, validate_dimension, Embedder};
pub use error::DomainError;
pub use fingerprint::{normalize_query, Fingerprint, NormalizedQuery, MAX_QUERY_CHARS};
pub use router::{
    FallbackPattern, PatternSpec, RouteDecision, RouteDefinition, RouteSource, RouteSpec,
    RouteSummary, RouterConfig, UNROUTED,
};
pub use semantic_cache::{
    CacheEntry, CacheHit, CacheLookup, SemanticCacheConfig, SemanticCacheStats, TtlClass,
};
pub use vector_store::{VectorMatch, VectorRecord, VectorStore};
pub use workflow::{WorkflowExecutor, WorkflowKind, WorkflowOutcome};
