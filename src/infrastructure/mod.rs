//! Infrastructure layer - Backends, outbound clients and engine services

pub mod cache;
pub mod embedding;
pub mod http;
pub mod logging;
pub mod observability;
pub mod services;
pub mod singleflight;
pub mod vector_store;
pub mod workflow;
