//! Semantic router domain models
//!
//! Routes pick a workflow by nearest labeled example, falling back to
//! literal/regex patterns when vector confidence is low.

mod config;
mod decision;
mod definition;

pub use config::{RouteSpec, RouterConfig};
pub use decision::{RouteDecision, RouteSource, UNROUTED};
pub use definition::{FallbackPattern, PatternSpec, RouteDefinition, RouteSummary};
