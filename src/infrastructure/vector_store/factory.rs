//! Vector store factory for runtime selection

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::vector_store::VectorStore;
use crate::domain::DomainError;

use super::in_memory::InMemoryVectorStore;
use super::redis::{RedisVectorStore, RedisVectorStoreConfig};

/// Supported vector store backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorStoreType {
    /// Linear scan over a process-local map
    #[default]
    InMemory,
    /// Redis Stack with an HNSW index
    Redis,
}

impl std::fmt::Display for VectorStoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorStoreType::InMemory => write!(f, "in_memory"),
            VectorStoreType::Redis => write!(f, "redis"),
        }
    }
}

impl std::str::FromStr for VectorStoreType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(VectorStoreType::InMemory),
            "redis" => Ok(VectorStoreType::Redis),
            _ => Err(DomainError::configuration(format!(
                "Unknown vector store type: {}. Valid types: in_memory, redis",
                s
            ))),
        }
    }
}

/// Configuration for the vector store factory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub backend: VectorStoreType,

    /// Redis URL (required for the redis backend)
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Names the index (`{prefix}_idx`) and prefixes every key (`{prefix}:`)
    #[serde(default = "default_index_prefix")]
    pub index_prefix: String,
}

fn default_index_prefix() -> String {
    "qde".to_string()
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorStoreType::InMemory,
            redis_url: None,
            index_prefix: default_index_prefix(),
        }
    }
}

impl VectorStoreConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            backend: VectorStoreType::Redis,
            redis_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn index_name(&self) -> String {
        format!("{}_idx", self.index_prefix)
    }

    pub fn key_prefix(&self) -> String {
        format!("{}:", self.index_prefix)
    }
}

/// Factory for creating vector store instances
#[derive(Debug, Default)]
pub struct VectorStoreFactory;

impl VectorStoreFactory {
    pub fn new() -> Self {
        Self
    }

    /// Creates (and for remote backends, connects) a vector store
    pub async fn create(
        &self,
        config: &VectorStoreConfig,
    ) -> Result<Arc<dyn VectorStore>, DomainError> {
        match config.backend {
            VectorStoreType::InMemory => Ok(Arc::new(InMemoryVectorStore::new())),
            VectorStoreType::Redis => {
                let url = config.redis_url.clone().ok_or_else(|| {
                    DomainError::configuration("Redis URL is required for the redis vector store")
                })?;

                let store = RedisVectorStore::new(
                    RedisVectorStoreConfig::new(url)
                        .with_index_name(config.index_name())
                        .with_key_prefix(config.key_prefix()),
                )
                .await?;

                Ok(Arc::new(store))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_type_from_str() {
        assert_eq!(
            "in_memory".parse::<VectorStoreType>().unwrap(),
            VectorStoreType::InMemory
        );
        assert_eq!("REDIS".parse::<VectorStoreType>().unwrap(), VectorStoreType::Redis);
        assert!("faiss".parse::<VectorStoreType>().is_err());
    }

    #[test]
    fn test_config_deserialize() {
        let config: VectorStoreConfig =
            serde_json::from_str(r#"{"backend": "redis", "redis_url": "redis://x"}"#).unwrap();

        assert_eq!(config.backend, VectorStoreType::Redis);
        assert_eq!(config.index_name(), "qde_idx");
        assert_eq!(config.key_prefix(), "qde:");
    }

    #[tokio::test]
    async fn test_factory_create_in_memory() {
        let store = VectorStoreFactory::new()
            .create(&VectorStoreConfig::in_memory())
            .await
            .unwrap();

        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_factory_redis_missing_url() {
        let config = VectorStoreConfig {
            backend: VectorStoreType::Redis,
            ..Default::default()
        };

        let result = VectorStoreFactory::new().create(&config).await;
        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }
}
