//! Embedder trait definition

use async_trait::async_trait;
use std::fmt::Debug;

use crate::domain::DomainError;

/// Maps text to a fixed-dimension vector (OpenAI, local model, etc.)
///
/// Implementations report transport and rate-limit failures as
/// [`DomainError::EmbedderUnavailable`].
#[async_trait]
pub trait Embedder: Send + Sync + Debug {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError>;

    /// Output dimension of this embedder
    fn dimension(&self) -> usize;

    /// Get the provider name
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::RwLock;
    use std::time::Duration;

    /// Table-driven embedder
    ///
    /// Texts registered with [`MockEmbedder::with_vector`] return that
    /// vector; anything else gets a deterministic hash-derived vector.
    #[derive(Debug)]
    pub struct MockEmbedder {
        dimension: usize,
        vectors: RwLock<HashMap<String, Vec<f32>>>,
        error: RwLock<Option<String>>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl MockEmbedder {
        pub fn new(dimension: usize) -> Self {
            Self {
                dimension,
                vectors: RwLock::new(HashMap::new()),
                error: RwLock::new(None),
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn with_vector(self, text: impl Into<String>, vector: Vec<f32>) -> Self {
            self.vectors.write().unwrap().insert(text.into(), vector);
            self
        }

        pub fn with_error(self, error: impl Into<String>) -> Self {
            *self.error.write().unwrap() = Some(error.into());
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn set_error(&self, error: Option<String>) {
            *self.error.write().unwrap() = error;
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn hashed_vector(&self, text: &str) -> Vec<f32> {
            let hash = text
                .bytes()
                .fold(0xcbf2_9ce4_8422_2325u64, |acc, b| {
                    (acc ^ b as u64).wrapping_mul(0x0100_0000_01b3)
                });

            (0..self.dimension)
                .map(|i| {
                    let mixed = hash.rotate_left((i % 64) as u32).wrapping_add(i as u64);
                    ((mixed % 1000) as f32 / 1000.0) - 0.5
                })
                .collect()
        }
    }

    #[async_trait]
    impl Embedder for MockEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            if let Some(ref error) = *self.error.read().unwrap() {
                return Err(DomainError::embedder_unavailable(error.clone()));
            }

            if let Some(vector) = self.vectors.read().unwrap().get(text) {
                return Ok(vector.clone());
            }

            Ok(self.hashed_vector(text))
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_registered_vector_returned() {
            let embedder = MockEmbedder::new(3).with_vector("hello", vec![1.0, 0.0, 0.0]);

            assert_eq!(embedder.embed("hello").await.unwrap(), vec![1.0, 0.0, 0.0]);
            assert_eq!(embedder.calls(), 1);
        }

        #[tokio::test]
        async fn test_deterministic_fallback() {
            let embedder = MockEmbedder::new(16);

            let a = embedder.embed("some text").await.unwrap();
            let b = embedder.embed("some text").await.unwrap();

            assert_eq!(a, b);
            assert_eq!(a.len(), 16);
        }

        #[tokio::test]
        async fn test_error_injection() {
            let embedder = MockEmbedder::new(4).with_error("rate limited");

            let err = embedder.embed("x").await.unwrap_err();
            assert!(matches!(err, DomainError::EmbedderUnavailable { .. }));
        }
    }
}
