//! Route definitions

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::embedding::cosine_similarity;
use crate::domain::workflow::WorkflowKind;
use crate::domain::DomainError;

/// Literal or regex matcher consulted when vector confidence is low
///
/// Literals match case-insensitively against the normalized query;
/// regexes match against the original query text.
#[derive(Debug, Clone)]
pub enum FallbackPattern {
    Literal(String),
    Regex(Regex),
}

/// Serialized form: `{"literal": "..."}` or `{"regex": "..."}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternSpec {
    Literal(String),
    Regex(String),
}

impl FallbackPattern {
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into().to_lowercase())
    }

    pub fn regex(pattern: &str) -> Result<Self, DomainError> {
        Regex::new(pattern)
            .map(Self::Regex)
            .map_err(|e| DomainError::configuration(format!("Invalid route pattern '{}': {}", pattern, e)))
    }

    pub fn from_spec(spec: &PatternSpec) -> Result<Self, DomainError> {
        match spec {
            PatternSpec::Literal(text) => Ok(Self::literal(text.as_str())),
            PatternSpec::Regex(pattern) => Self::regex(pattern),
        }
    }

    pub fn to_spec(&self) -> PatternSpec {
        match self {
            Self::Literal(text) => PatternSpec::Literal(text.clone()),
            Self::Regex(regex) => PatternSpec::Regex(regex.as_str().to_string()),
        }
    }

    pub fn matches(&self, original: &str, normalized: &str) -> bool {
        match self {
            Self::Literal(text) => normalized.contains(text.as_str()),
            Self::Regex(regex) => regex.is_match(original),
        }
    }
}

impl Serialize for FallbackPattern {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_spec().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FallbackPattern {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let spec = PatternSpec::deserialize(deserializer)?;
        Self::from_spec(&spec).map_err(serde::de::Error::custom)
    }
}

/// A workflow route with its labeled example embeddings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDefinition {
    route_id: String,
    workflow: WorkflowKind,
    /// Append-only; grows only with confirmed decisions
    #[serde(default)]
    example_embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    fallback_patterns: Vec<FallbackPattern>,
}

impl RouteDefinition {
    pub fn new(route_id: impl Into<String>, workflow: WorkflowKind) -> Self {
        Self {
            route_id: route_id.into(),
            workflow,
            example_embeddings: Vec::new(),
            fallback_patterns: Vec::new(),
        }
    }

    pub fn with_example(mut self, embedding: Vec<f32>) -> Self {
        self.example_embeddings.push(embedding);
        self
    }

    pub fn with_pattern(mut self, pattern: FallbackPattern) -> Self {
        self.fallback_patterns.push(pattern);
        self
    }

    pub fn route_id(&self) -> &str {
        &self.route_id
    }

    pub fn workflow(&self) -> WorkflowKind {
        self.workflow
    }

    pub fn example_embeddings(&self) -> &[Vec<f32>] {
        &self.example_embeddings
    }

    pub fn example_count(&self) -> usize {
        self.example_embeddings.len()
    }

    pub fn fallback_patterns(&self) -> &[FallbackPattern] {
        &self.fallback_patterns
    }

    /// Only routes with at least one example take part in vector matching
    pub fn is_vector_eligible(&self) -> bool {
        !self.example_embeddings.is_empty()
    }

    pub(crate) fn push_example(&mut self, embedding: Vec<f32>) {
        self.example_embeddings.push(embedding);
    }

    /// Best similarity of `query` across this route's examples
    ///
    /// One strong example is enough evidence, so this is the maximum,
    /// not the mean.
    pub fn best_similarity(&self, query: &[f32]) -> Option<f32> {
        self.example_embeddings
            .iter()
            .map(|example| cosine_similarity(query, example))
            .fold(None, |best, sim| match best {
                Some(b) if b >= sim => Some(b),
                _ => Some(sim),
            })
    }

    /// Whether any fallback pattern matches the query
    pub fn matches_pattern(&self, original: &str, normalized: &str) -> bool {
        self.fallback_patterns
            .iter()
            .any(|pattern| pattern.matches(original, normalized))
    }

    pub fn summary(&self) -> RouteSummary {
        RouteSummary {
            route_id: self.route_id.clone(),
            workflow: self.workflow,
            example_count: self.example_count(),
            fallback_patterns: self.fallback_patterns.iter().map(|p| p.to_spec()).collect(),
        }
    }
}

/// Route listing without embeddings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSummary {
    pub route_id: String,
    pub workflow: WorkflowKind,
    pub example_count: usize,
    pub fallback_patterns: Vec<PatternSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_similarity_is_max() {
        let route = RouteDefinition::new("price", WorkflowKind::MarketData)
            .with_example(vec![1.0, 0.0])
            .with_example(vec![0.0, 1.0]);

        let best = route.best_similarity(&[1.0, 0.0]).unwrap();
        assert!((best - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_no_examples_not_eligible() {
        let route = RouteDefinition::new("news", WorkflowKind::News);

        assert!(!route.is_vector_eligible());
        assert!(route.best_similarity(&[1.0, 0.0]).is_none());
    }

    #[test]
    fn test_literal_pattern_is_case_insensitive() {
        let pattern = FallbackPattern::literal("Headlines");
        assert!(pattern.matches("Latest HEADLINES for TSLA", "latest headlines for tsla"));
    }

    #[test]
    fn test_regex_pattern_uses_original_text() {
        let pattern = FallbackPattern::regex(r"\b[A-Z]{2,5}\b price").unwrap();

        assert!(pattern.matches("MSFT price today", "msft price today"));
        assert!(!pattern.matches("msft price today", "msft price today"));
    }

    #[test]
    fn test_invalid_regex() {
        let err = FallbackPattern::regex("(unclosed").unwrap_err();
        assert!(matches!(err, DomainError::Configuration { .. }));
    }

    #[test]
    fn test_pattern_serde() {
        let patterns: Vec<FallbackPattern> =
            serde_json::from_str(r#"[{"literal": "RSI"}, {"regex": "(?i)macd"}]"#).unwrap();

        assert!(matches!(&patterns[0], FallbackPattern::Literal(t) if t == "rsi"));
        assert!(patterns[1].matches("show MACD", "show macd"));

        let json = serde_json::to_string(&patterns).unwrap();
        assert_eq!(json, r#"[{"literal":"rsi"},{"regex":"(?i)macd"}]"#);
    }
}
