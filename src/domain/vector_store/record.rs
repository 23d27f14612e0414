//! Vector store record types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored vector with its metadata
///
/// Keys have the form `{namespace}:{id}`; the namespace scopes nearest
/// neighbor queries and range scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    key: String,
    vector: Vec<f32>,
    metadata: Map<String, Value>,
}

impl VectorRecord {
    /// Create a new record
    pub fn new(key: impl Into<String>, vector: Vec<f32>, metadata: Map<String, Value>) -> Self {
        Self {
            key: key.into(),
            vector,
            metadata,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn namespace(&self) -> &str {
        namespace_of(&self.key)
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.metadata
    }

    pub fn into_parts(self) -> (String, Vec<f32>, Map<String, Value>) {
        (self.key, self.vector, self.metadata)
    }
}

/// One nearest-neighbor query result
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub key: String,
    pub metadata: Map<String, Value>,
    /// Cosine similarity to the query vector
    pub similarity: f32,
}

impl VectorMatch {
    pub fn new(key: impl Into<String>, metadata: Map<String, Value>, similarity: f32) -> Self {
        Self {
            key: key.into(),
            metadata,
            similarity,
        }
    }
}

/// Keys returned by one step of a range scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    pub keys: Vec<String>,
    /// Cursor of the following page; `None` once the scan is complete
    pub next: Option<String>,
}

/// Namespace portion of a `{namespace}:{id}` key
pub fn namespace_of(key: &str) -> &str {
    key.split_once(':').map(|(ns, _)| ns).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_of() {
        assert_eq!(namespace_of("cache:abc"), "cache");
        assert_eq!(namespace_of("route:price:lookup"), "route");
        assert_eq!(namespace_of("plain"), "");
    }

    #[test]
    fn test_record_accessors() {
        let mut metadata = Map::new();
        metadata.insert("payload".to_string(), Value::from("hi"));

        let record = VectorRecord::new("cache:1", vec![0.5, 0.5], metadata);

        assert_eq!(record.key(), "cache:1");
        assert_eq!(record.namespace(), "cache");
        assert_eq!(record.vector(), &[0.5, 0.5]);
        assert_eq!(record.metadata()["payload"], "hi");
    }
}
