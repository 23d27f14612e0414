//! Embedder implementations

mod openai;

pub use openai::{OpenAiEmbedder, DEFAULT_OPENAI_BASE_URL};
