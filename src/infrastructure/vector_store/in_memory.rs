//! In-memory vector store implementation

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::embedding::cosine_similarity;
use crate::domain::vector_store::{namespace_of, ScanPage, VectorMatch, VectorRecord, VectorStore};
use crate::domain::DomainError;

/// In-memory vector store using linear search
///
/// Suitable for development, tests and single-process deployments.
/// Every operation runs under one lock, so writes are atomic with
/// respect to readers.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    records: RwLock<HashMap<String, Stored>>,
    dimension: RwLock<Option<usize>>,
    unavailable: AtomicBool,
    writes: AtomicU64,
}

#[derive(Debug)]
struct Stored {
    record: VectorRecord,
    /// Order of the last whole-record write
    written: u64,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call fails until cleared
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored records across namespaces
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::vector_store_unavailable(
                "in-memory store marked unavailable",
            ));
        }
        Ok(())
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), DomainError> {
        let dimension = self
            .dimension
            .read()
            .map_err(|e| DomainError::internal(format!("Failed to acquire read lock: {}", e)))?;

        match *dimension {
            Some(expected) if expected != vector.len() => Err(DomainError::validation(format!(
                "Vector has dimension {}, store expects {}",
                vector.len(),
                expected
            ))),
            _ => Ok(()),
        }
    }
}

fn lock_error(e: impl std::fmt::Display) -> DomainError {
    DomainError::internal(format!("Failed to acquire lock: {}", e))
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn verify_schema(&self, dimension: usize) -> Result<(), DomainError> {
        self.check_available()?;

        let mut current = self.dimension.write().map_err(lock_error)?;
        match *current {
            Some(existing) if existing != dimension => Err(DomainError::configuration(format!(
                "Vector store holds {}-dimensional vectors, embedder produces {}",
                existing, dimension
            ))),
            _ => {
                *current = Some(dimension);
                Ok(())
            }
        }
    }

    async fn ping(&self) -> Result<(), DomainError> {
        self.check_available()
    }

    async fn put(
        &self,
        key: &str,
        vector: &[f32],
        metadata: Map<String, Value>,
    ) -> Result<(), DomainError> {
        self.check_available()?;
        self.check_dimension(vector)?;

        let mut records = self.records.write().map_err(lock_error)?;
        let written = self.writes.fetch_add(1, Ordering::SeqCst);
        records.insert(
            key.to_string(),
            Stored {
                record: VectorRecord::new(key, vector.to_vec(), metadata),
                written,
            },
        );

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<VectorRecord>, DomainError> {
        self.check_available()?;

        let records = self.records.read().map_err(lock_error)?;
        Ok(records.get(key).map(|stored| stored.record.clone()))
    }

    async fn ann_query(
        &self,
        namespace: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<VectorMatch>, DomainError> {
        self.check_available()?;

        let records = self.records.read().map_err(lock_error)?;

        let mut scored: Vec<(f32, &Stored)> = records
            .values()
            .filter(|stored| stored.record.namespace() == namespace)
            .map(|stored| (cosine_similarity(vector, stored.record.vector()), stored))
            .collect();

        // Similarity descending, then latest write first
        scored.sort_by(|(sim_a, a), (sim_b, b)| {
            sim_b
                .partial_cmp(sim_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.written.cmp(&a.written))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(similarity, stored)| {
                VectorMatch::new(
                    stored.record.key(),
                    stored.record.metadata().clone(),
                    similarity,
                )
            })
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        self.check_available()?;

        let mut records = self.records.write().map_err(lock_error)?;
        Ok(records.remove(key).is_some())
    }

    async fn append_list(
        &self,
        key: &str,
        field: &str,
        value: Value,
    ) -> Result<usize, DomainError> {
        self.check_available()?;

        let mut records = self.records.write().map_err(lock_error)?;
        let stored = records
            .get_mut(key)
            .ok_or_else(|| DomainError::not_found(format!("No record under '{}'", key)))?;

        let list = stored
            .record
            .metadata_mut()
            .entry(field.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));

        match list {
            Value::Array(items) => {
                items.push(value);
                Ok(items.len())
            }
            _ => Err(DomainError::validation(format!(
                "Field '{}' of '{}' is not a list",
                field, key
            ))),
        }
    }

    async fn set_fields(
        &self,
        key: &str,
        fields: Map<String, Value>,
    ) -> Result<bool, DomainError> {
        self.check_available()?;

        let mut records = self.records.write().map_err(lock_error)?;
        match records.get_mut(key) {
            Some(stored) => {
                stored.record.metadata_mut().extend(fields);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn scan_keys(
        &self,
        namespace: &str,
        cursor: Option<&str>,
        count: usize,
    ) -> Result<ScanPage, DomainError> {
        self.check_available()?;

        let records = self.records.read().map_err(lock_error)?;
        // Cursor is the last key handed out
        let mut keys: Vec<String> = records
            .keys()
            .filter(|key| namespace_of(key) == namespace)
            .filter(|key| cursor.is_none_or(|after| key.as_str() > after))
            .cloned()
            .collect();
        keys.sort();

        let count = count.max(1);
        let next = match keys.len() > count {
            true => {
                keys.truncate(count);
                keys.last().cloned()
            }
            false => None,
        };

        Ok(ScanPage { keys, next })
    }
}

/// Wrapper adding latency to a shared in-memory store
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct LaggyVectorStore {
    pub inner: InMemoryVectorStore,
    /// Added before every `get`
    pub get_delay_ms: AtomicU64,
    /// Added after `ann_query` has read the records
    pub ann_reply_delay_ms: AtomicU64,
}

#[cfg(test)]
impl LaggyVectorStore {
    async fn lag(delay: &AtomicU64) {
        let millis = delay.load(Ordering::SeqCst);
        if millis > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(millis)).await;
        }
    }
}

#[cfg(test)]
#[async_trait]
impl VectorStore for LaggyVectorStore {
    async fn verify_schema(&self, dimension: usize) -> Result<(), DomainError> {
        self.inner.verify_schema(dimension).await
    }

    async fn ping(&self) -> Result<(), DomainError> {
        self.inner.ping().await
    }

    async fn put(
        &self,
        key: &str,
        vector: &[f32],
        metadata: Map<String, Value>,
    ) -> Result<(), DomainError> {
        self.inner.put(key, vector, metadata).await
    }

    async fn get(&self, key: &str) -> Result<Option<VectorRecord>, DomainError> {
        Self::lag(&self.get_delay_ms).await;
        self.inner.get(key).await
    }

    async fn ann_query(
        &self,
        namespace: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<VectorMatch>, DomainError> {
        let matches = self.inner.ann_query(namespace, vector, k).await;
        Self::lag(&self.ann_reply_delay_ms).await;
        matches
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        self.inner.delete(key).await
    }

    async fn append_list(&self, key: &str, field: &str, value: Value) -> Result<usize, DomainError> {
        self.inner.append_list(key, field, value).await
    }

    async fn set_fields(&self, key: &str, fields: Map<String, Value>) -> Result<bool, DomainError> {
        self.inner.set_fields(key, fields).await
    }

    async fn scan_keys(
        &self,
        namespace: &str,
        cursor: Option<&str>,
        count: usize,
    ) -> Result<ScanPage, DomainError> {
        self.inner.scan_keys(namespace, cursor, count).await
    }
}
