//! Redis vector store implementation (RediSearch HNSW index)
//!
//! Each record is a hash:
//! - `vec`: the vector as little-endian FLOAT32 bytes
//! - `ns`: the key namespace, indexed as a TAG to scope KNN queries
//! - `m:{field}`: one JSON-encoded value per top-level metadata field
//!
//! Per-field storage lets hit counters and example lists be updated in
//! place without rewriting the whole record.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script, Value as RedisValue};
use serde_json::{Map, Value};

use crate::domain::vector_store::{namespace_of, ScanPage, VectorMatch, VectorRecord, VectorStore};
use crate::domain::DomainError;

const VECTOR_FIELD: &str = "vec";
const NAMESPACE_FIELD: &str = "ns";
const METADATA_PREFIX: &str = "m:";
const SCORE_FIELD: &str = "__score";

const APPEND_LIST_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then return -1 end
local raw = redis.call('HGET', KEYS[1], ARGV[1])
local updated
if (not raw) or raw == '[]' then
  updated = '[' .. ARGV[2] .. ']'
else
  if string.sub(raw, 1, 1) ~= '[' then return -2 end
  updated = string.sub(raw, 1, -2) .. ',' .. ARGV[2] .. ']'
end
redis.call('HSET', KEYS[1], ARGV[1], updated)
return #cjson.decode(updated)
"#;

const SET_FIELDS_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then return 0 end
for i = 1, #ARGV, 2 do
  redis.call('HSET', KEYS[1], ARGV[i], ARGV[i + 1])
end
return 1
"#;

/// Configuration for the Redis vector store
#[derive(Debug, Clone)]
pub struct RedisVectorStoreConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// RediSearch index name
    pub index_name: String,
    /// Prefix of every key owned by the store
    pub key_prefix: String,
    /// Connection timeout
    pub connection_timeout: Duration,
}

impl Default for RedisVectorStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            index_name: "qde_idx".to_string(),
            key_prefix: "qde:".to_string(),
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisVectorStoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_index_name(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = index_name.into();
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }
}

/// Vector store backed by Redis Stack
#[derive(Clone)]
pub struct RedisVectorStore {
    connection: ConnectionManager,
    config: RedisVectorStoreConfig,
    append_list_script: Script,
    set_fields_script: Script,
}

impl fmt::Debug for RedisVectorStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisVectorStore")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

fn unavailable(context: &str, e: impl fmt::Display) -> DomainError {
    DomainError::vector_store_unavailable(format!("{}: {}", context, e))
}

impl RedisVectorStore {
    /// Connect to Redis
    pub async fn new(config: RedisVectorStoreConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| DomainError::configuration(format!("Invalid Redis URL: {}", e)))?;

        let connection = tokio::time::timeout(config.connection_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                DomainError::timeout(
                    "connect to vector store",
                    config.connection_timeout.as_millis() as u64,
                )
            })?
            .map_err(|e| unavailable("Failed to connect to Redis", e))?;

        Ok(Self {
            connection,
            config,
            append_list_script: Script::new(APPEND_LIST_SCRIPT),
            set_fields_script: Script::new(SET_FIELDS_SCRIPT),
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    fn strip_prefix<'a>(&self, full_key: &'a str) -> &'a str {
        full_key
            .strip_prefix(self.config.key_prefix.as_str())
            .unwrap_or(full_key)
    }

    fn schema_key(&self) -> String {
        format!("{}__schema", self.config.key_prefix)
    }

    async fn read_record(
        &self,
        conn: &mut ConnectionManager,
        key: &str,
    ) -> Result<Option<VectorRecord>, DomainError> {
        let fields: HashMap<String, Vec<u8>> = conn
            .hgetall(self.full_key(key))
            .await
            .map_err(|e| unavailable(&format!("Failed to read '{}'", key), e))?;

        if fields.is_empty() {
            return Ok(None);
        }

        let vector = fields
            .get(VECTOR_FIELD)
            .map(|bytes| decode_vector(bytes))
            .transpose()?
            .unwrap_or_default();

        let metadata = decode_metadata(fields.iter().map(|(k, v)| (k.as_str(), v.as_slice())))?;

        Ok(Some(VectorRecord::new(key, vector, metadata)))
    }
}

#[async_trait]
impl VectorStore for RedisVectorStore {
    async fn verify_schema(&self, dimension: usize) -> Result<(), DomainError> {
        let mut conn = self.connection.clone();
        let schema_key = self.schema_key();

        let recorded: Option<usize> = conn
            .get(&schema_key)
            .await
            .map_err(|e| unavailable("Failed to read schema", e))?;

        match recorded {
            Some(existing) if existing != dimension => {
                return Err(DomainError::configuration(format!(
                    "Index '{}' holds {}-dimensional vectors, embedder produces {}",
                    self.config.index_name, existing, dimension
                )));
            }
            Some(_) => {}
            None => {
                let _: () = conn
                    .set(&schema_key, dimension)
                    .await
                    .map_err(|e| unavailable("Failed to record schema", e))?;
            }
        }

        let created: Result<(), redis::RedisError> = redis::cmd("FT.CREATE")
            .arg(&self.config.index_name)
            .arg("ON")
            .arg("HASH")
            .arg("PREFIX")
            .arg(1)
            .arg(&self.config.key_prefix)
            .arg("SCHEMA")
            .arg(NAMESPACE_FIELD)
            .arg("TAG")
            .arg(VECTOR_FIELD)
            .arg("VECTOR")
            .arg("HNSW")
            .arg(6)
            .arg("TYPE")
            .arg("FLOAT32")
            .arg("DIM")
            .arg(dimension)
            .arg("DISTANCE_METRIC")
            .arg("COSINE")
            .query_async(&mut conn)
            .await;

        match created {
            Ok(()) => {
                tracing::info!(index = %self.config.index_name, dimension, "Created vector index");
                Ok(())
            }
            Err(e) if e.to_string().contains("Index already exists") => Ok(()),
            Err(e) => Err(unavailable("Failed to create vector index", e)),
        }
    }

    async fn ping(&self) -> Result<(), DomainError> {
        let mut conn = self.connection.clone();

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| unavailable("Ping failed", e))?;

        Ok(())
    }

    async fn put(
        &self,
        key: &str,
        vector: &[f32],
        metadata: Map<String, Value>,
    ) -> Result<(), DomainError> {
        let mut conn = self.connection.clone();
        let full_key = self.full_key(key);

        let mut hset = redis::cmd("HSET");
        hset.arg(&full_key)
            .arg(VECTOR_FIELD)
            .arg(encode_vector(vector))
            .arg(NAMESPACE_FIELD)
            .arg(namespace_of(key));

        for (field, value) in &metadata {
            hset.arg(format!("{}{}", METADATA_PREFIX, field))
                .arg(value.to_string());
        }

        // DEL + HSET in one MULTI so readers never see a partial record
        let mut pipe = redis::pipe();
        pipe.atomic().del(&full_key).ignore().add_command(hset).ignore();

        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| unavailable(&format!("Failed to write '{}'", key), e))?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<VectorRecord>, DomainError> {
        let mut conn = self.connection.clone();
        self.read_record(&mut conn, key).await
    }

    async fn ann_query(
        &self,
        namespace: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<VectorMatch>, DomainError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.connection.clone();

        let query = format!(
            "(@{}:{{{}}})=>[KNN {} @{} $BLOB AS {}]",
            NAMESPACE_FIELD,
            escape_tag(namespace),
            k,
            VECTOR_FIELD,
            SCORE_FIELD
        );

        let response: RedisValue = redis::cmd("FT.SEARCH")
            .arg(&self.config.index_name)
            .arg(&query)
            .arg("PARAMS")
            .arg(2)
            .arg("BLOB")
            .arg(encode_vector(vector))
            .arg("SORTBY")
            .arg(SCORE_FIELD)
            .arg("LIMIT")
            .arg(0)
            .arg(k)
            .arg("DIALECT")
            .arg(2)
            .query_async(&mut conn)
            .await
            .map_err(|e| unavailable("Vector search failed", e))?;

        let mut matches = parse_search_response(response)?;
        for m in &mut matches {
            m.key = self.strip_prefix(&m.key).to_string();
        }

        Ok(matches)
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let mut conn = self.connection.clone();

        let deleted: i64 = conn
            .del(self.full_key(key))
            .await
            .map_err(|e| unavailable(&format!("Failed to delete '{}'", key), e))?;

        Ok(deleted > 0)
    }

    async fn append_list(
        &self,
        key: &str,
        field: &str,
        value: Value,
    ) -> Result<usize, DomainError> {
        let mut conn = self.connection.clone();

        let length: i64 = self
            .append_list_script
            .key(self.full_key(key))
            .arg(format!("{}{}", METADATA_PREFIX, field))
            .arg(value.to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| unavailable(&format!("Failed to append to '{}'", key), e))?;

        match length {
            -1 => Err(DomainError::not_found(format!("No record under '{}'", key))),
            -2 => Err(DomainError::validation(format!(
                "Field '{}' of '{}' is not a list",
                field, key
            ))),
            n => Ok(n as usize),
        }
    }

    async fn set_fields(
        &self,
        key: &str,
        fields: Map<String, Value>,
    ) -> Result<bool, DomainError> {
        if fields.is_empty() {
            return Ok(true);
        }

        let mut conn = self.connection.clone();

        let mut invocation = self.set_fields_script.key(self.full_key(key));
        for (field, value) in &fields {
            invocation
                .arg(format!("{}{}", METADATA_PREFIX, field))
                .arg(value.to_string());
        }

        let updated: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| unavailable(&format!("Failed to update '{}'", key), e))?;

        Ok(updated == 1)
    }

    async fn scan_keys(
        &self,
        namespace: &str,
        cursor: Option<&str>,
        count: usize,
    ) -> Result<ScanPage, DomainError> {
        let mut conn = self.connection.clone();
        let pattern = self.full_key(&format!("{}:*", namespace));

        let start: u64 = match cursor {
            Some(raw) => raw.parse().map_err(|_| {
                DomainError::validation(format!("Invalid scan cursor '{}'", raw))
            })?,
            None => 0,
        };

        let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(start)
            .arg("MATCH")
            .arg(&pattern)
            .arg("COUNT")
            .arg(count.max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| unavailable(&format!("Failed to scan '{}'", namespace), e))?;

        Ok(ScanPage {
            keys: batch
                .iter()
                .map(|full_key| self.strip_prefix(full_key).to_string())
                .collect(),
            next: (next != 0).then(|| next.to_string()),
        })
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>, DomainError> {
    if bytes.len() % 4 != 0 {
        return Err(DomainError::vector_store_unavailable(format!(
            "Stored vector has {} bytes, not a multiple of 4",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn decode_metadata<'a>(
    fields: impl Iterator<Item = (&'a str, &'a [u8])>,
) -> Result<Map<String, Value>, DomainError> {
    let mut metadata = Map::new();

    for (name, raw) in fields {
        let Some(field) = name.strip_prefix(METADATA_PREFIX) else {
            continue;
        };

        let value: Value = serde_json::from_slice(raw).map_err(|e| {
            DomainError::vector_store_unavailable(format!(
                "Malformed metadata field '{}': {}",
                field, e
            ))
        })?;
        metadata.insert(field.to_string(), value);
    }

    Ok(metadata)
}

/// Escape a TAG value for a RediSearch query
fn escape_tag(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if !c.is_ascii_alphanumeric() && c != '_' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn redis_bytes(value: &RedisValue) -> Option<&[u8]> {
    match value {
        RedisValue::BulkString(bytes) => Some(bytes.as_slice()),
        RedisValue::SimpleString(s) => Some(s.as_bytes()),
        _ => None,
    }
}

/// Parse an `FT.SEARCH` reply: `[total, key, [field, value, ...], ...]`
fn parse_search_response(response: RedisValue) -> Result<Vec<VectorMatch>, DomainError> {
    let RedisValue::Array(items) = response else {
        return Err(DomainError::vector_store_unavailable(
            "Unexpected vector search reply",
        ));
    };

    let mut matches = Vec::new();
    let mut iter = items.into_iter().skip(1);

    while let (Some(key), Some(fields)) = (iter.next(), iter.next()) {
        let key = redis_bytes(&key)
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .ok_or_else(|| DomainError::vector_store_unavailable("Search result key missing"))?;

        let RedisValue::Array(fields) = fields else {
            return Err(DomainError::vector_store_unavailable(format!(
                "Search result fields for '{}' malformed",
                key
            )));
        };

        let pairs: Vec<(&str, &[u8])> = fields
            .chunks_exact(2)
            .filter_map(|pair| {
                let name = std::str::from_utf8(redis_bytes(&pair[0])?).ok()?;
                Some((name, redis_bytes(&pair[1])?))
            })
            .collect();

        let distance = pairs
            .iter()
            .find(|(name, _)| *name == SCORE_FIELD)
            .and_then(|(_, raw)| std::str::from_utf8(raw).ok())
            .and_then(|s| s.parse::<f32>().ok())
            .ok_or_else(|| {
                DomainError::vector_store_unavailable(format!("Search result '{}' has no score", key))
            })?;

        let metadata = decode_metadata(pairs.into_iter())?;

        // COSINE distance is 1 - similarity
        matches.push(VectorMatch::new(key, metadata, 1.0 - distance));
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &str) -> RedisValue {
        RedisValue::BulkString(s.as_bytes().to_vec())
    }

    #[test]
    fn test_vector_bytes_round_trip() {
        let vector = vec![0.25, -1.5, 3.0];
        let bytes = encode_vector(&vector);

        assert_eq!(bytes.len(), 12);
        assert_eq!(decode_vector(&bytes).unwrap(), vector);
        assert!(decode_vector(&bytes[..5]).is_err());
    }

    #[test]
    fn test_escape_tag() {
        assert_eq!(escape_tag("cache"), "cache");
        assert_eq!(escape_tag("my-ns"), "my\\-ns");
    }

    #[test]
    fn test_decode_metadata_skips_internal_fields() {
        let fields = vec![
            ("m:hit_count", b"3".as_slice()),
            ("m:payload", br#"{"a":1}"#.as_slice()),
            ("ns", b"cache".as_slice()),
            ("__score", b"0.1".as_slice()),
        ];

        let metadata = decode_metadata(fields.into_iter()).unwrap();

        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata["hit_count"], 3);
        assert_eq!(metadata["payload"]["a"], 1);
    }

    #[test]
    fn test_parse_search_response() {
        let response = RedisValue::Array(vec![
            RedisValue::Int(2),
            bulk("qde:cache:a"),
            RedisValue::Array(vec![
                bulk("__score"),
                bulk("0.05"),
                bulk("m:query"),
                bulk("\"what is aapl's price?\""),
            ]),
            bulk("qde:cache:b"),
            RedisValue::Array(vec![bulk("__score"), bulk("0.4")]),
        ]);

        let matches = parse_search_response(response).unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].key, "qde:cache:a");
        assert!((matches[0].similarity - 0.95).abs() < 1e-6);
        assert_eq!(matches[0].metadata["query"], "what is aapl's price?");
        assert!((matches[1].similarity - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_parse_search_response_rejects_garbage() {
        assert!(parse_search_response(RedisValue::Nil).is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = RedisVectorStoreConfig::new("redis://localhost")
            .with_index_name("idx")
            .with_key_prefix("test:");

        assert_eq!(config.index_name, "idx");
        assert_eq!(config.key_prefix, "test:");
    }

    // Note: These tests require a running Redis Stack instance

    #[tokio::test]
    #[ignore = "Requires running Redis Stack instance"]
    async fn test_redis_round_trip() {
        let store = RedisVectorStore::new(
            RedisVectorStoreConfig::new("redis://127.0.0.1:6379")
                .with_index_name("qde_test_idx")
                .with_key_prefix("qde_test:"),
        )
        .await
        .unwrap();
        store.verify_schema(2).await.unwrap();

        let mut metadata = Map::new();
        metadata.insert("examples".to_string(), serde_json::json!([[1.0, 0.0]]));
        store.put("route:price", &[1.0, 0.0], metadata).await.unwrap();

        let len = store
            .append_list("route:price", "examples", serde_json::json!([0.9, 0.1]))
            .await
            .unwrap();
        assert_eq!(len, 2);

        let matches = store.ann_query("route", &[1.0, 0.0], 1).await.unwrap();
        assert_eq!(matches[0].key, "route:price");

        let mut cursor = None;
        let mut keys = Vec::new();
        loop {
            let page = store.scan_keys("route", cursor.as_deref(), 10).await.unwrap();
            keys.extend(page.keys);
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        assert!(keys.contains(&"route:price".to_string()));

        store.delete("route:price").await.unwrap();
    }
}
