//! Vector store domain models and traits
//!
//! The vector store is an external key-value store with nearest-neighbor
//! search over fixed-dimension vectors. Only the fingerprint index talks
//! to it directly.

mod record;
mod store;

pub use record::{namespace_of, ScanPage, VectorMatch, VectorRecord};
pub use store::VectorStore;
