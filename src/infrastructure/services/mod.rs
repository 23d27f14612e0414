//! Infrastructure services

mod background;
mod decision_engine;
mod engine;
mod fingerprint_index;
mod semantic_cache_service;
mod semantic_router_service;
mod tool_cache_service;

pub use background::{spawn_route_refresher, spawn_sweeper, BackgroundTask};
pub use decision_engine::{Decision, DecisionEngine, DecisionSource};
pub use engine::{EngineComponents, EngineHandle};
pub use fingerprint_index::FingerprintIndex;
pub use semantic_cache_service::{SemanticCacheService, StoreOutcome};
pub use semantic_router_service::SemanticRouterService;
pub use tool_cache_service::ToolCacheService;

#[cfg(test)]
pub(crate) use engine::test_support;
