//! Fingerprint index
//!
//! Maps normalized queries to cache entries and route ids to route
//! definitions on top of the vector store. Every embedder and store
//! call made by the engine goes through here, with a bounded timeout
//! and the deployment's vector dimension enforced on both sides.
//! Range scans are paged; the timeout bounds each page and each record
//! read, not the whole scan.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::warn;

use crate::domain::fingerprint::{Fingerprint, NormalizedQuery};
use crate::domain::router::{FallbackPattern, PatternSpec, RouteDefinition};
use crate::domain::semantic_cache::CacheEntry;
use crate::domain::vector_store::{VectorMatch, VectorRecord, VectorStore};
use crate::domain::workflow::WorkflowKind;
use crate::domain::{validate_dimension, DomainError, Embedder};

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);
const SCAN_PAGE_SIZE: usize = 100;

const ROUTE_FIELD_ID: &str = "route_id";
const ROUTE_FIELD_WORKFLOW: &str = "workflow";
const ROUTE_FIELD_EXAMPLES: &str = "examples";
const ROUTE_FIELD_PATTERNS: &str = "fallback_patterns";

/// Domain view over the vector store
#[derive(Debug)]
pub struct FingerprintIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    dimension: usize,
    embedder_timeout: Duration,
    store_timeout: Duration,
    cache_namespace: String,
    route_namespace: String,
}

impl FingerprintIndex {
    /// The vector dimension is taken from the embedder
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        let dimension = embedder.dimension();
        Self {
            store,
            embedder,
            dimension,
            embedder_timeout: DEFAULT_TIMEOUT,
            store_timeout: DEFAULT_TIMEOUT,
            cache_namespace: "cache".to_string(),
            route_namespace: "route".to_string(),
        }
    }

    pub fn with_timeouts(mut self, embedder: Duration, store: Duration) -> Self {
        self.embedder_timeout = embedder;
        self.store_timeout = store;
        self
    }

    pub fn with_namespaces(mut self, cache: impl Into<String>, route: impl Into<String>) -> Self {
        self.cache_namespace = cache.into();
        self.route_namespace = route.into();
        self
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Connect-time check of the store schema
    pub async fn verify_schema(&self) -> Result<(), DomainError> {
        self.store_call("verify_schema", self.store.verify_schema(self.dimension))
            .await
    }

    pub async fn ping(&self) -> Result<(), DomainError> {
        self.store_call("ping", self.store.ping()).await
    }

    // Embedding

    /// Embed the normalized form of a query
    pub async fn embed(&self, query: &NormalizedQuery) -> Result<Vec<f32>, DomainError> {
        let millis = self.embedder_timeout.as_millis() as u64;

        let vector = tokio::time::timeout(self.embedder_timeout, self.embedder.embed(query.normalized()))
            .await
            .map_err(|_| DomainError::timeout("embed", millis))??;

        validate_dimension(&vector, self.dimension).map_err(|e| {
            DomainError::embedder_unavailable(format!(
                "{} returned a bad vector: {}",
                self.embedder.provider_name(),
                e
            ))
        })?;

        Ok(vector)
    }

    /// Check a caller-supplied vector against the deployment dimension
    pub fn check_vector(&self, vector: &[f32]) -> Result<(), DomainError> {
        validate_dimension(vector, self.dimension)
    }

    // Cache entries

    fn cache_key(&self, fingerprint: &Fingerprint) -> String {
        format!("{}:{}", self.cache_namespace, fingerprint.as_str())
    }

    /// Nearest cache entries, best first
    pub async fn nearest_entries(
        &self,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<VectorMatch>, DomainError> {
        self.store_call(
            "ann_query",
            self.store.ann_query(&self.cache_namespace, vector, k),
        )
        .await
    }

    pub async fn get_entry(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>, DomainError> {
        let record = self
            .store_call("get", self.store.get(&self.cache_key(fingerprint)))
            .await?;

        record.map(CacheEntry::from_record).transpose()
    }

    /// Whole-record write of an entry
    pub async fn put_entry(&self, entry: &CacheEntry) -> Result<(), DomainError> {
        let metadata = entry.to_metadata()?;
        let key = self.cache_key(entry.fingerprint());

        self.store_call("put", self.store.put(&key, entry.embedding(), metadata))
            .await
    }

    /// Write the access counters of an entry; false if it is gone
    pub async fn touch_entry(&self, entry: &CacheEntry) -> Result<bool, DomainError> {
        let key = self.cache_key(entry.fingerprint());

        self.store_call("set_fields", self.store.set_fields(&key, entry.access_fields()))
            .await
    }

    pub async fn delete_entry(&self, fingerprint: &Fingerprint) -> Result<bool, DomainError> {
        self.store_call("delete", self.store.delete(&self.cache_key(fingerprint)))
            .await
    }

    /// Every readable cache entry; malformed records are skipped
    pub async fn scan_entries(&self) -> Result<Vec<CacheEntry>, DomainError> {
        let records = self.scan_namespace(&self.cache_namespace).await?;

        Ok(records
            .into_iter()
            .filter_map(|record| {
                let key = record.key().to_string();
                match CacheEntry::from_record(record) {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        warn!(key = %key, error = %e, "Skipping malformed cache record");
                        None
                    }
                }
            })
            .collect())
    }

    // Routes

    fn route_key(&self, route_id: &str) -> String {
        format!("{}:{}", self.route_namespace, route_id)
    }

    /// Store a route definition, replacing any previous one
    pub async fn put_route(&self, route: &RouteDefinition) -> Result<(), DomainError> {
        let mut metadata = Map::new();
        metadata.insert(ROUTE_FIELD_ID.to_string(), Value::from(route.route_id()));
        metadata.insert(
            ROUTE_FIELD_WORKFLOW.to_string(),
            Value::from(route.workflow().as_str()),
        );
        metadata.insert(
            ROUTE_FIELD_EXAMPLES.to_string(),
            Value::Array(route.example_embeddings().iter().map(|e| vector_value(e)).collect()),
        );
        let patterns: Vec<PatternSpec> = route.fallback_patterns().iter().map(|p| p.to_spec()).collect();
        metadata.insert(
            ROUTE_FIELD_PATTERNS.to_string(),
            serde_json::to_value(patterns)
                .map_err(|e| DomainError::internal(format!("Failed to serialize patterns: {}", e)))?,
        );

        // The record vector is the first example so routes stay visible
        // to the store's index; matching reads the example list.
        let anchor = route
            .example_embeddings()
            .first()
            .cloned()
            .unwrap_or_else(|| vec![0.0; self.dimension]);

        self.store_call(
            "put",
            self.store.put(&self.route_key(route.route_id()), &anchor, metadata),
        )
        .await
    }

    /// Atomically append a confirmed example, returning the new count
    pub async fn append_route_example(
        &self,
        route_id: &str,
        embedding: &[f32],
    ) -> Result<usize, DomainError> {
        self.check_vector(embedding)?;

        self.store_call(
            "append_list",
            self.store.append_list(
                &self.route_key(route_id),
                ROUTE_FIELD_EXAMPLES,
                vector_value(embedding),
            ),
        )
        .await
    }

    pub async fn get_route(&self, route_id: &str) -> Result<Option<RouteDefinition>, DomainError> {
        let record = self
            .store_call("get", self.store.get(&self.route_key(route_id)))
            .await?;

        record
            .map(|record| route_from_metadata(record.metadata()))
            .transpose()
    }

    /// Every readable route definition, ordered by route id
    pub async fn load_routes(&self) -> Result<Vec<RouteDefinition>, DomainError> {
        let records = self.scan_namespace(&self.route_namespace).await?;

        let mut routes: Vec<RouteDefinition> = records
            .iter()
            .filter_map(|record| match route_from_metadata(record.metadata()) {
                Ok(route) => Some(route),
                Err(e) => {
                    warn!(key = record.key(), error = %e, "Skipping malformed route record");
                    None
                }
            })
            .collect();

        routes.sort_by(|a, b| a.route_id().cmp(b.route_id()));
        Ok(routes)
    }

    /// Every record of a namespace, ordered by key
    async fn scan_namespace(&self, namespace: &str) -> Result<Vec<VectorRecord>, DomainError> {
        let mut seen = HashSet::new();
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .store_call(
                    "scan",
                    self.store.scan_keys(namespace, cursor.as_deref(), SCAN_PAGE_SIZE),
                )
                .await?;

            for key in page.keys {
                if !seen.insert(key.clone()) {
                    continue;
                }
                // None if deleted since the page was read
                if let Some(record) = self.store_call("get", self.store.get(&key)).await? {
                    records.push(record);
                }
            }

            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        records.sort_by(|a, b| a.key().cmp(b.key()));
        Ok(records)
    }

    async fn store_call<T, F>(&self, operation: &str, call: F) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, DomainError>>,
    {
        let millis = self.store_timeout.as_millis() as u64;

        tokio::time::timeout(self.store_timeout, call)
            .await
            .map_err(|_| DomainError::timeout(format!("vector store {}", operation), millis))?
    }
}

fn vector_value(vector: &[f32]) -> Value {
    Value::Array(vector.iter().map(|v| Value::from(*v as f64)).collect())
}

fn route_from_metadata(metadata: &Map<String, Value>) -> Result<RouteDefinition, DomainError> {
    let malformed = |what: &str| DomainError::vector_store_unavailable(format!("Malformed route record: {}", what));

    let route_id = metadata
        .get(ROUTE_FIELD_ID)
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing route_id"))?;

    let workflow: WorkflowKind = metadata
        .get(ROUTE_FIELD_WORKFLOW)
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing workflow"))?
        .parse()
        .map_err(|e: DomainError| malformed(&e.to_string()))?;

    let mut route = RouteDefinition::new(route_id, workflow);

    if let Some(examples) = metadata.get(ROUTE_FIELD_EXAMPLES) {
        let examples: Vec<Vec<f32>> = serde_json::from_value(examples.clone())
            .map_err(|e| malformed(&e.to_string()))?;
        for example in examples {
            route.push_example(example);
        }
    }

    if let Some(patterns) = metadata.get(ROUTE_FIELD_PATTERNS) {
        let patterns: Vec<PatternSpec> = serde_json::from_value(patterns.clone())
            .map_err(|e| malformed(&e.to_string()))?;
        for spec in &patterns {
            route = route.with_pattern(FallbackPattern::from_spec(spec)?);
        }
    }

    Ok(route)
}
