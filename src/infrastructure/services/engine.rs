//! Assembly of the decision engine from configuration

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{
    spawn_route_refresher, spawn_sweeper, BackgroundTask, DecisionEngine, FingerprintIndex,
    SemanticCacheService, SemanticRouterService, ToolCacheService,
};
use crate::config::AppConfig;
use crate::domain::cache::Cache;
use crate::domain::embedding::Embedder;
use crate::domain::vector_store::VectorStore;
use crate::domain::workflow::WorkflowExecutor;
use crate::domain::{Clock, DomainError, SystemClock};
use crate::infrastructure::cache::CacheFactory;
use crate::infrastructure::embedding::OpenAiEmbedder;
use crate::infrastructure::http::HttpClient;
use crate::infrastructure::vector_store::VectorStoreFactory;
use crate::infrastructure::workflow::HttpWorkflowExecutor;

/// Backends the engine runs on
pub struct EngineComponents {
    pub store: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn Embedder>,
    pub tool_cache: Arc<dyn Cache>,
    pub executor: Arc<dyn WorkflowExecutor>,
    pub clock: Arc<dyn Clock>,
}

/// Every long-lived service of a running engine
#[derive(Debug)]
pub struct EngineHandle {
    pub index: Arc<FingerprintIndex>,
    pub cache: Arc<SemanticCacheService>,
    pub router: Arc<SemanticRouterService>,
    /// For in-process tools; configured from `tool_cache` and `engine.tool_cache_ttl_secs`
    pub tool_cache: Arc<ToolCacheService>,
    pub decisions: Arc<DecisionEngine>,
    tasks: Mutex<Vec<BackgroundTask>>,
}

impl EngineHandle {
    /// Connect the configured backends and start the engine
    pub async fn from_config(config: &AppConfig) -> Result<Self, DomainError> {
        let store = VectorStoreFactory::new().create(&config.vector_store).await?;
        let tool_cache = CacheFactory::new().create(&config.tool_cache).await?;

        let mut embedder = OpenAiEmbedder::new(
            HttpClient::new(),
            config.embedder.base_url.clone(),
            config.embedder.model.clone(),
            config.engine.embedding_dimension,
        );
        match std::env::var(&config.embedder.api_key_env) {
            Ok(key) if !key.is_empty() => embedder = embedder.with_api_key(key),
            _ => warn!(
                env = %config.embedder.api_key_env,
                "No embedder API key set, sending unauthenticated requests"
            ),
        }

        let workflow_client = HttpClient::with_timeout(std::time::Duration::from_millis(
            config.workflows.timeout_ms,
        ))
        .map_err(|e| DomainError::configuration(e.to_string()))?;
        let executor = HttpWorkflowExecutor::new(workflow_client, config.workflows.base_url.clone());

        info!(
            vector_store = %config.vector_store.backend,
            tool_cache = %config.tool_cache.backend,
            model = %config.embedder.model,
            dimension = config.engine.embedding_dimension,
            "Engine backends created"
        );

        Self::start(
            config,
            EngineComponents {
                store,
                embedder: Arc::new(embedder),
                tool_cache,
                executor: Arc::new(executor),
                clock: Arc::new(SystemClock),
            },
        )
        .await
    }

    /// Start the engine on explicit backends
    ///
    /// Verifies the store schema, loads stored routes, seeds the
    /// configured ones that are missing and starts the sweeper and the
    /// route refresher.
    pub async fn start(config: &AppConfig, components: EngineComponents) -> Result<Self, DomainError> {
        let engine = &config.engine;

        if components.embedder.dimension() != engine.embedding_dimension {
            return Err(DomainError::configuration(format!(
                "Embedder produces {}-dimensional vectors, engine.embedding_dimension is {}",
                components.embedder.dimension(),
                engine.embedding_dimension
            )));
        }

        let index = Arc::new(
            FingerprintIndex::new(components.store, components.embedder)
                .with_timeouts(engine.embedder_timeout(), engine.store_timeout()),
        );
        index.verify_schema().await?;

        let cache = Arc::new(SemanticCacheService::new(
            Arc::clone(&index),
            components.clock,
            engine.semantic_cache_config(),
        ));
        let router = Arc::new(SemanticRouterService::new(
            Arc::clone(&index),
            engine.router_config(),
        ));

        let stored = router.refresh().await?;
        let seeded = router.seed(&config.routes).await?;
        info!(stored, seeded, "Routes loaded");

        let tool_cache = Arc::new(ToolCacheService::new(
            components.tool_cache,
            engine.tool_cache_ttl(),
        ));
        let decisions = Arc::new(DecisionEngine::new(
            Arc::clone(&index),
            Arc::clone(&cache),
            Arc::clone(&router),
            components.executor,
        ));

        let mut tasks = vec![spawn_sweeper(Arc::clone(&cache), engine.sweep_interval())];
        if let Some(every) = engine.route_refresh_interval() {
            tasks.push(spawn_route_refresher(Arc::clone(&router), every));
        }

        Ok(Self {
            index,
            cache,
            router,
            tool_cache,
            decisions,
            tasks: Mutex::new(tasks),
        })
    }

    /// Stop the background tasks and fail any in-flight computation
    pub async fn shutdown(&self) {
        let tasks: Vec<BackgroundTask> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            task.stop().await;
        }
        self.decisions.shutdown();
        self.tool_cache.shutdown();
        info!("Engine stopped");
    }
}
