use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::router::{FallbackPattern, RouteSpec, RouterConfig};
use crate::domain::semantic_cache::{SemanticCacheConfig, TtlClass};
use crate::domain::DomainError;
use crate::infrastructure::cache::{CacheConfig, CacheType};
use crate::infrastructure::embedding::DEFAULT_OPENAI_BASE_URL;
use crate::infrastructure::observability::MetricsConfig;
use crate::infrastructure::vector_store::{VectorStoreConfig, VectorStoreType};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub tool_cache: CacheConfig,
    #[serde(default)]
    pub embedder: EmbedderConfig,
    #[serde(default)]
    pub workflows: WorkflowsConfig,
    #[serde(default)]
    pub routes: Vec<RouteSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Decision engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_cache_similarity_threshold")]
    pub cache_similarity_threshold: f32,
    #[serde(default = "default_router_similarity_threshold")]
    pub router_similarity_threshold: f32,
    #[serde(default = "default_ann_top_k")]
    pub ann_top_k: usize,
    /// Fixed per deployment; the store index is created with it
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default)]
    pub ttl_classes: TtlClassesConfig,
    #[serde(default = "default_tool_cache_ttl_secs")]
    pub tool_cache_ttl_secs: u64,
    #[serde(default = "default_embedder_timeout_ms")]
    pub embedder_timeout_ms: u64,
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// How often routes are reloaded from the store; 0 turns it off
    #[serde(default = "default_route_refresh_secs")]
    pub route_refresh_secs: u64,
}

/// Per-class TTL overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtlClassesConfig {
    #[serde(default = "default_volatile_secs")]
    pub volatile_secs: u64,
    /// Falls back to `engine.cache_ttl_secs`
    #[serde(default)]
    pub standard_secs: Option<u64>,
    #[serde(default = "default_durable_secs")]
    pub durable_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderConfig {
    #[serde(default = "default_embedder_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedder_model")]
    pub model: String,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowsConfig {
    #[serde(default = "default_workflows_base_url")]
    pub base_url: String,
    #[serde(default = "default_workflows_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_cache_similarity_threshold() -> f32 {
    0.92
}

fn default_router_similarity_threshold() -> f32 {
    0.85
}

fn default_ann_top_k() -> usize {
    5
}

fn default_embedding_dimension() -> usize {
    1536
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_tool_cache_ttl_secs() -> u64 {
    120
}

fn default_embedder_timeout_ms() -> u64 {
    2000
}

fn default_store_timeout_ms() -> u64 {
    250
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_route_refresh_secs() -> u64 {
    30
}

fn default_volatile_secs() -> u64 {
    300
}

fn default_durable_secs() -> u64 {
    86_400
}

fn default_embedder_base_url() -> String {
    DEFAULT_OPENAI_BASE_URL.to_string()
}

fn default_embedder_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_workflows_base_url() -> String {
    "http://localhost:9000".to_string()
}

fn default_workflows_timeout_ms() -> u64 {
    30_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_similarity_threshold: default_cache_similarity_threshold(),
            router_similarity_threshold: default_router_similarity_threshold(),
            ann_top_k: default_ann_top_k(),
            embedding_dimension: default_embedding_dimension(),
            cache_ttl_secs: default_cache_ttl_secs(),
            ttl_classes: TtlClassesConfig::default(),
            tool_cache_ttl_secs: default_tool_cache_ttl_secs(),
            embedder_timeout_ms: default_embedder_timeout_ms(),
            store_timeout_ms: default_store_timeout_ms(),
            sweep_interval_secs: default_sweep_interval_secs(),
            route_refresh_secs: default_route_refresh_secs(),
        }
    }
}

impl Default for TtlClassesConfig {
    fn default() -> Self {
        Self {
            volatile_secs: default_volatile_secs(),
            standard_secs: None,
            durable_secs: default_durable_secs(),
        }
    }
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedder_base_url(),
            model: default_embedder_model(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl Default for WorkflowsConfig {
    fn default() -> Self {
        Self {
            base_url: default_workflows_base_url(),
            timeout_ms: default_workflows_timeout_ms(),
        }
    }
}

impl EngineConfig {
    pub fn semantic_cache_config(&self) -> SemanticCacheConfig {
        let standard = self.ttl_classes.standard_secs.unwrap_or(self.cache_ttl_secs);

        SemanticCacheConfig::new()
            .with_similarity_threshold(self.cache_similarity_threshold)
            .with_top_k(self.ann_top_k)
            .with_ttl(TtlClass::Volatile, Duration::from_secs(self.ttl_classes.volatile_secs))
            .with_ttl(TtlClass::Standard, Duration::from_secs(standard))
            .with_ttl(TtlClass::Durable, Duration::from_secs(self.ttl_classes.durable_secs))
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig::new().with_similarity_threshold(self.router_similarity_threshold)
    }

    pub fn tool_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.tool_cache_ttl_secs)
    }

    pub fn embedder_timeout(&self) -> Duration {
        Duration::from_millis(self.embedder_timeout_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn route_refresh_interval(&self) -> Option<Duration> {
        (self.route_refresh_secs > 0).then(|| Duration::from_secs(self.route_refresh_secs))
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("QDE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Clamp tunables into range and reject settings the engine cannot run with
    pub fn validated(mut self) -> Result<Self, DomainError> {
        let engine = &mut self.engine;
        engine.cache_similarity_threshold = clamp_threshold(
            "engine.cache_similarity_threshold",
            engine.cache_similarity_threshold,
        )?;
        engine.router_similarity_threshold = clamp_threshold(
            "engine.router_similarity_threshold",
            engine.router_similarity_threshold,
        )?;

        if engine.ann_top_k == 0 {
            return Err(DomainError::configuration("engine.ann_top_k must be at least 1"));
        }
        if engine.embedding_dimension == 0 {
            return Err(DomainError::configuration(
                "engine.embedding_dimension must be greater than 0",
            ));
        }
        if engine.embedder_timeout_ms == 0 || engine.store_timeout_ms == 0 {
            return Err(DomainError::configuration("engine timeouts must be greater than 0"));
        }

        if self.vector_store.backend == VectorStoreType::Redis && self.vector_store.redis_url.is_none() {
            return Err(DomainError::configuration(
                "vector_store.redis_url is required for the redis backend",
            ));
        }
        if self.tool_cache.backend == CacheType::Redis && self.tool_cache.redis_url.is_none() {
            return Err(DomainError::configuration(
                "tool_cache.redis_url is required for the redis backend",
            ));
        }

        let mut seen = HashSet::new();
        for route in &self.routes {
            if route.route_id.trim().is_empty() {
                return Err(DomainError::configuration("route_id must not be empty"));
            }
            if !seen.insert(route.route_id.as_str()) {
                return Err(DomainError::configuration(format!(
                    "Duplicate route_id '{}'",
                    route.route_id
                )));
            }
            for pattern in &route.fallback_patterns {
                FallbackPattern::from_spec(pattern)?;
            }
        }

        Ok(self)
    }
}

fn clamp_threshold(name: &str, value: f32) -> Result<f32, DomainError> {
    if value.is_nan() {
        return Err(DomainError::configuration(format!("{} must be a number", name)));
    }

    let clamped = value.clamp(0.0, 1.0);
    if clamped != value {
        tracing::warn!(setting = name, value, clamped, "Similarity threshold clamped into [0, 1]");
    }
    Ok(clamped)
}
