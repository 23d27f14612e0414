//! Embedder domain models and traits

mod embedder;
mod similarity;

pub use embedder::Embedder;
pub use similarity::{cosine_similarity, validate_dimension};

#[cfg(test)]
pub use embedder::mock::MockEmbedder;
