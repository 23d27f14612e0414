//! OpenAI-compatible embedder
//!
//! Works against any server exposing `POST {base_url}/v1/embeddings`
//! (OpenAI, Azure-style gateways, local model servers).

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::embedding::{validate_dimension, Embedder};
use crate::domain::DomainError;
use crate::infrastructure::http::{HttpClientTrait, HttpError};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Embedder backed by an OpenAI-style embeddings endpoint
#[derive(Debug)]
pub struct OpenAiEmbedder<C: HttpClientTrait> {
    client: C,
    auth_header: Option<String>,
    base_url: String,
    model: String,
    dimension: usize,
}

impl<C: HttpClientTrait> OpenAiEmbedder<C> {
    /// Create an embedder for `model`, which must produce `dimension`-sized vectors
    pub fn new(
        client: C,
        base_url: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self {
            client,
            auth_header: None,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            dimension,
        }
    }

    pub fn with_api_key(mut self, api_key: impl AsRef<str>) -> Self {
        self.auth_header = Some(format!("Bearer {}", api_key.as_ref()));
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.base_url)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        let mut headers = vec![("Content-Type", "application/json")];
        if let Some(auth) = &self.auth_header {
            headers.push(("Authorization", auth.as_str()));
        }
        headers
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<Vec<f32>, DomainError> {
        let response: EmbeddingsResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::embedder_unavailable(format!("Failed to parse embedding response: {}", e))
        })?;

        let vector = response
            .data
            .into_iter()
            .min_by_key(|d| d.index)
            .map(|d| d.embedding)
            .ok_or_else(|| DomainError::embedder_unavailable("Embedding response has no data"))?;

        // A model returning the wrong size would poison the index
        validate_dimension(&vector, self.dimension).map_err(|e| {
            DomainError::embedder_unavailable(format!("Model '{}' {}", self.model, e))
        })?;

        Ok(vector)
    }
}

#[async_trait]
impl<C: HttpClientTrait> Embedder for OpenAiEmbedder<C> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "dimensions": self.dimension,
        });

        let response = self
            .client
            .post_json(&self.embeddings_url(), self.headers(), &body)
            .await
            .map_err(|e| match e {
                HttpError::Timeout => DomainError::embedder_unavailable("embedding request timed out"),
                other => DomainError::embedder_unavailable(other.to_string()),
            })?;

        self.parse_response(response)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}
