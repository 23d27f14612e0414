//! Semantic cache entry and result types

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::fingerprint::Fingerprint;
use crate::domain::vector_store::VectorRecord;
use crate::domain::DomainError;

/// Staleness class of a cached response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlClass {
    /// Quickly changing answers (quotes, intraday figures)
    Volatile,
    #[default]
    Standard,
    /// Answers that hold for a day or more
    Durable,
}

impl TtlClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Volatile => "volatile",
            Self::Standard => "standard",
            Self::Durable => "durable",
        }
    }
}

/// A cached response keyed by query fingerprint
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    fingerprint: Fingerprint,
    embedding: Vec<f32>,
    query_text: String,
    response_payload: Value,
    created_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
    hit_count: u64,
    ttl: Duration,
    ttl_class: TtlClass,
}

/// Stored form of everything but the embedding
#[derive(Debug, Serialize, Deserialize)]
struct EntryMetadata {
    fingerprint: Fingerprint,
    query: String,
    payload: Value,
    created_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
    hit_count: u64,
    ttl_secs: u64,
    ttl_class: TtlClass,
}

const FIELD_HIT_COUNT: &str = "hit_count";
const FIELD_LAST_ACCESSED_AT: &str = "last_accessed_at";

impl CacheEntry {
    /// Create a new cache entry
    pub fn new(
        fingerprint: Fingerprint,
        embedding: Vec<f32>,
        query_text: impl Into<String>,
        response_payload: Value,
        ttl_class: TtlClass,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            fingerprint,
            embedding,
            query_text: query_text.into(),
            response_payload,
            created_at: now,
            last_accessed_at: now,
            hit_count: 0,
            ttl,
            ttl_class,
        }
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    /// Normalized query text the entry was stored under
    pub fn query_text(&self) -> &str {
        &self.query_text
    }

    pub fn response_payload(&self) -> &Value {
        &self.response_payload
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_accessed_at(&self) -> DateTime<Utc> {
        self.last_accessed_at
    }

    pub fn hit_count(&self) -> u64 {
        self.hit_count
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn ttl_class(&self) -> TtlClass {
        self.ttl_class
    }

    /// When the entry stops being eligible for hits
    pub fn expires_at(&self) -> DateTime<Utc> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .unwrap_or_else(|_| chrono::Duration::days(365 * 100));
        self.created_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Check if the entry is stale at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// Same response under the same staleness policy
    pub fn same_content(&self, other: &CacheEntry) -> bool {
        self.response_payload == other.response_payload
            && self.ttl_class == other.ttl_class
            && self.ttl == other.ttl
    }

    /// Replace the response, keeping the write-once embedding and the
    /// hit counter, and restart the TTL window
    pub fn replaced_by(&self, newer: CacheEntry) -> CacheEntry {
        CacheEntry {
            fingerprint: self.fingerprint.clone(),
            embedding: self.embedding.clone(),
            query_text: self.query_text.clone(),
            hit_count: self.hit_count,
            ..newer
        }
    }

    /// Record a read hit
    pub fn record_hit(&mut self, now: DateTime<Utc>) {
        self.hit_count += 1;
        self.last_accessed_at = now;
    }

    /// Metadata fields written on a read hit
    pub fn access_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(FIELD_HIT_COUNT.to_string(), Value::from(self.hit_count));
        fields.insert(
            FIELD_LAST_ACCESSED_AT.to_string(),
            Value::from(self.last_accessed_at.to_rfc3339()),
        );
        fields
    }

    /// Store metadata for this entry
    pub fn to_metadata(&self) -> Result<Map<String, Value>, DomainError> {
        let metadata = EntryMetadata {
            fingerprint: self.fingerprint.clone(),
            query: self.query_text.clone(),
            payload: self.response_payload.clone(),
            created_at: self.created_at,
            last_accessed_at: self.last_accessed_at,
            hit_count: self.hit_count,
            ttl_secs: self.ttl.as_secs(),
            ttl_class: self.ttl_class,
        };

        match serde_json::to_value(metadata) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(DomainError::internal("Cache metadata is not an object")),
            Err(e) => Err(DomainError::internal(format!(
                "Failed to serialize cache metadata: {}",
                e
            ))),
        }
    }

    /// Rebuild an entry from its stored embedding and metadata
    pub fn from_parts(embedding: Vec<f32>, metadata: Map<String, Value>) -> Result<Self, DomainError> {
        let metadata: EntryMetadata = serde_json::from_value(Value::Object(metadata))
            .map_err(|e| {
                DomainError::vector_store_unavailable(format!("Malformed cache record: {}", e))
            })?;

        Ok(Self {
            fingerprint: metadata.fingerprint,
            embedding,
            query_text: metadata.query,
            response_payload: metadata.payload,
            created_at: metadata.created_at,
            last_accessed_at: metadata.last_accessed_at,
            hit_count: metadata.hit_count,
            ttl: Duration::from_secs(metadata.ttl_secs),
            ttl_class: metadata.ttl_class,
        })
    }

    /// Rebuild an entry from a full store record
    pub fn from_record(record: VectorRecord) -> Result<Self, DomainError> {
        let (_, vector, metadata) = record.into_parts();
        Self::from_parts(vector, metadata)
    }
}

/// A cache hit
#[derive(Debug, Clone)]
pub struct CacheHit {
    /// The entry, with hit count and access time already updated
    pub entry: CacheEntry,
    /// Similarity of the query to the entry (0.0 to 1.0)
    pub similarity: f32,
}

/// Outcome of a semantic cache lookup
#[derive(Debug, Clone)]
pub enum CacheLookup {
    Hit(CacheHit),
    Miss,
}

impl CacheLookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    pub fn hit(self) -> Option<CacheHit> {
        match self {
            Self::Hit(hit) => Some(hit),
            Self::Miss => None,
        }
    }
}

/// Statistics for the semantic cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemanticCacheStats {
    /// Total number of stored entries (fresh and stale)
    pub total_entries: usize,
    /// Total cache hits
    pub hits: u64,
    /// Total cache misses
    pub misses: u64,
    /// Lookups that degraded to a miss because of an infrastructure failure
    pub degraded: u64,
    /// Entries physically deleted by sweeps
    pub swept: u64,
}

impl SemanticCacheStats {
    /// Calculate hit rate
    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;

        if total == 0 {
            return 0.0;
        }

        self.hits as f32 / total as f32
    }
}
