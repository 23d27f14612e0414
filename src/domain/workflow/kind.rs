//! Workflow variants

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::semantic_cache::TtlClass;
use crate::domain::DomainError;

/// Downstream workflow handling a routed query
///
/// Adding a workflow means adding a variant here and a route definition
/// that names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    /// Quotes and price lookups
    MarketData,
    /// Indicator calculations (RSI, MACD, moving averages)
    Technical,
    /// Risk metrics (volatility, VaR, drawdown)
    Risk,
    /// News retrieval and summarisation
    News,
    /// Portfolio-level questions
    Portfolio,
    /// Full agent execution with model-based classification
    General,
}

impl WorkflowKind {
    pub const ALL: [WorkflowKind; 6] = [
        Self::MarketData,
        Self::Technical,
        Self::Risk,
        Self::News,
        Self::Portfolio,
        Self::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MarketData => "market_data",
            Self::Technical => "technical",
            Self::Risk => "risk",
            Self::News => "news",
            Self::Portfolio => "portfolio",
            Self::General => "general",
        }
    }

    /// How long answers from this workflow stay fresh in the semantic cache
    pub fn ttl_class(&self) -> TtlClass {
        match self {
            Self::MarketData | Self::News => TtlClass::Volatile,
            Self::Technical | Self::Risk | Self::Portfolio | Self::General => TtlClass::Standard,
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DomainError::configuration(format!("Unknown workflow: {}", s)))
    }
}
