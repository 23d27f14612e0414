//! Vector store trait definition

use std::fmt::Debug;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{ScanPage, VectorMatch, VectorRecord};
use crate::domain::DomainError;

/// Key-value store with nearest-neighbor search
///
/// Implementations report connectivity and protocol failures as
/// [`DomainError::VectorStoreUnavailable`].
#[async_trait]
pub trait VectorStore: Send + Sync + Debug {
    /// Connect-time check that the store can serve vectors of `dimension`
    async fn verify_schema(&self, dimension: usize) -> Result<(), DomainError>;

    /// Liveness probe
    async fn ping(&self) -> Result<(), DomainError>;

    /// Insert or replace the record under `key` as one atomic write
    async fn put(
        &self,
        key: &str,
        vector: &[f32],
        metadata: Map<String, Value>,
    ) -> Result<(), DomainError>;

    /// Exact-match lookup by key
    async fn get(&self, key: &str) -> Result<Option<VectorRecord>, DomainError>;

    /// Nearest neighbors of `vector` within `namespace`, best first.
    /// Equal similarities favour the most recently written record where
    /// the backend can tell.
    async fn ann_query(
        &self,
        namespace: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<VectorMatch>, DomainError>;

    /// Delete the record under `key`, returning whether it existed
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// Atomically append `value` to the list stored in metadata `field`,
    /// returning the new list length
    async fn append_list(&self, key: &str, field: &str, value: Value)
        -> Result<usize, DomainError>;

    /// Overwrite individual metadata fields of an existing record without
    /// touching its vector or other fields. Returns false if the key is
    /// absent (the record is not recreated).
    async fn set_fields(&self, key: &str, fields: Map<String, Value>)
        -> Result<bool, DomainError>;

    /// One page of the keys in `namespace` (range query)
    ///
    /// Start with `cursor = None` and pass back `ScanPage::next` until it
    /// is `None`. `count` is a hint; a page may be empty while more keys
    /// remain, and a key may appear on more than one page.
    async fn scan_keys(
        &self,
        namespace: &str,
        cursor: Option<&str>,
        count: usize,
    ) -> Result<ScanPage, DomainError>;
}
