//! Query Decision Engine
//!
//! Sits in front of a set of agent workflows and decides, per query,
//! whether the answer can be served from a semantic cache, which
//! workflow should compute it, or whether the general agent has to:
//! - Semantic cache keyed by query embeddings, with TTL classes
//! - Semantic router learning from confirmed examples, with pattern fallback
//! - Exact-match tool cache with per-key singleflight
//! - In-memory or Redis backends for vectors and tool results

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use api::state::AppState;
use infrastructure::services::EngineHandle;
use tracing::info;

/// Connect the configured backends and start the engine
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let engine = EngineHandle::from_config(config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start decision engine: {}", e))?;

    info!(
        routes = engine.router.routes().len(),
        "Decision engine ready"
    );

    Ok(AppState::new(Arc::new(engine)))
}
