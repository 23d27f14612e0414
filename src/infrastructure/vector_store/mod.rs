//! Vector store infrastructure - VectorStore implementations

mod factory;
mod in_memory;
mod redis;

pub use factory::{VectorStoreConfig, VectorStoreFactory, VectorStoreType};
pub use in_memory::InMemoryVectorStore;
pub use redis::{RedisVectorStore, RedisVectorStoreConfig};
#[cfg(test)]
pub(crate) use in_memory::LaggyVectorStore;
