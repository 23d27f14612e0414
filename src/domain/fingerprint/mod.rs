//! Query fingerprints
//!
//! A fingerprint is the SHA-256 of the normalized query text. It is the
//! store key for semantic cache entries and the singleflight key for
//! in-flight computations.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::DomainError;

/// Longest query accepted before embedding, in characters
pub const MAX_QUERY_CHARS: usize = 8192;

/// Lowercase, trim and collapse internal whitespace runs to one space
pub fn normalize_query(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Deterministic identifier of a normalized query
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash already-normalized text
    pub fn of_normalized(normalized: &str) -> Self {
        let digest = Sha256::digest(normalized.as_bytes());
        Self(hex::encode(digest))
    }

    /// Wrap a fingerprint previously produced by this type
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A query that passed validation, with its normalized form and fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedQuery {
    original: String,
    normalized: String,
    fingerprint: Fingerprint,
}

impl NormalizedQuery {
    /// Validate and normalize raw query text
    ///
    /// Rejects text that is empty after normalization or longer than
    /// [`MAX_QUERY_CHARS`].
    pub fn parse(text: &str) -> Result<Self, DomainError> {
        if text.chars().count() > MAX_QUERY_CHARS {
            return Err(DomainError::malformed_input(format!(
                "query text exceeds {} characters",
                MAX_QUERY_CHARS
            )));
        }

        let normalized = normalize_query(text);

        if normalized.is_empty() {
            return Err(DomainError::malformed_input("query text is empty"));
        }

        let fingerprint = Fingerprint::of_normalized(&normalized);

        Ok(Self {
            original: text.to_string(),
            normalized,
            fingerprint,
        })
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}
