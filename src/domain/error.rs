use thiserror::Error;

/// Core domain errors
///
/// `Clone` so that a single failure can be handed to every waiter of a
/// shared computation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DomainError {
    #[error("Embedder unavailable: {message}")]
    EmbedderUnavailable { message: String },

    #[error("Vector store unavailable: {message}")]
    VectorStoreUnavailable { message: String },

    #[error("Computation failed: {message}")]
    ComputationFailed { message: String },

    #[error("Malformed fingerprint input: {message}")]
    MalformedInput { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Timed out after {millis}ms: {operation}")]
    Timeout { operation: String, millis: u64 },

    #[error("Shutting down")]
    Shutdown,

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn embedder_unavailable(message: impl Into<String>) -> Self {
        Self::EmbedderUnavailable {
            message: message.into(),
        }
    }

    pub fn vector_store_unavailable(message: impl Into<String>) -> Self {
        Self::VectorStoreUnavailable {
            message: message.into(),
        }
    }

    pub fn computation_failed(message: impl Into<String>) -> Self {
        Self::ComputationFailed {
            message: message.into(),
        }
    }

    pub fn malformed_input(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, millis: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            millis,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Failures of the embedder or the vector store (including their
    /// timeouts). Callers absorb these and continue without assistance.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::EmbedderUnavailable { .. }
                | Self::VectorStoreUnavailable { .. }
                | Self::Timeout { .. }
        )
    }
}
