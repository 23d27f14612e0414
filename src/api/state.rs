//! Application state shared by the handlers

use std::sync::Arc;

use crate::infrastructure::services::{
    DecisionEngine, EngineHandle, FingerprintIndex, SemanticCacheService, SemanticRouterService,
};

/// Cheap-to-clone handle on the running engine
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: Arc<EngineHandle>,
}

impl AppState {
    pub fn new(engine: Arc<EngineHandle>) -> Self {
        Self { engine }
    }

    pub fn decisions(&self) -> &DecisionEngine {
        &self.engine.decisions
    }

    pub fn cache(&self) -> &SemanticCacheService {
        &self.engine.cache
    }

    pub fn router(&self) -> &SemanticRouterService {
        &self.engine.router
    }

    pub fn index(&self) -> &FingerprintIndex {
        &self.engine.index
    }
}
