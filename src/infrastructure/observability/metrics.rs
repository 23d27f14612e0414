//! Prometheus metrics infrastructure

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use super::config::MetricsConfig;
use crate::domain::router::RouteSource;

/// Prometheus metrics handle for serving metrics endpoint
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl PrometheusMetrics {
    /// Get the metrics as a string for the /metrics endpoint
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Initialize Prometheus metrics
///
/// Returns `None` when disabled or when a recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("qde_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);

            tracing::info!("Prometheus metrics initialized at {}", config.path);

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

/// Create the metrics router
pub fn create_metrics_router(metrics: PrometheusMetrics, path: &str) -> Router {
    Router::new()
        .route(path, get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

/// Outcome label of a semantic cache lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookupResult {
    Hit,
    Miss,
    /// Miss caused by an embedder or store failure
    Degraded,
}

impl CacheLookupResult {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Degraded => "degraded",
        }
    }
}

/// Outcome label of a tool cache request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCacheResult {
    Hit,
    Miss,
    /// Backend unreachable; computed without caching
    Bypassed,
}

impl ToolCacheResult {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Bypassed => "bypassed",
        }
    }
}

pub fn record_cache_lookup(result: CacheLookupResult, duration: Duration) {
    counter!("semantic_cache_lookups_total", "result" => result.as_str()).increment(1);
    histogram!("semantic_cache_lookup_duration_seconds").record(duration.as_secs_f64());
}

pub fn record_route_decision(source: RouteSource) {
    let source = match source {
        RouteSource::Vector => "vector",
        RouteSource::Pattern => "pattern",
        RouteSource::Unrouted => "unrouted",
    };
    counter!("router_decisions_total", "source" => source).increment(1);
}

pub fn record_tool_cache(tool: &str, result: ToolCacheResult) {
    counter!(
        "tool_cache_requests_total",
        "tool" => tool.to_string(),
        "result" => result.as_str()
    )
    .increment(1);
}

pub fn record_singleflight_join(coordinator: &'static str) {
    counter!("singleflight_joins_total", "coordinator" => coordinator).increment(1);
}

/// An embedder or store failure absorbed into a miss or fallback
pub fn record_degraded(component: &'static str) {
    counter!("degraded_operations_total", "component" => component).increment(1);
}

pub fn record_sweep(deleted: usize) {
    counter!("cache_sweep_deleted_total").increment(deleted as u64);
}

/// Record an HTTP request metric
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_labels() {
        assert_eq!(CacheLookupResult::Degraded.as_str(), "degraded");
        assert_eq!(ToolCacheResult::Bypassed.as_str(), "bypassed");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_cache_lookup(CacheLookupResult::Hit, Duration::from_millis(3));
        record_route_decision(RouteSource::Pattern);
        record_tool_cache("rsi", ToolCacheResult::Miss);
        record_singleflight_join("decision");
        record_degraded("embedder");
        record_sweep(2);
    }

    #[test]
    fn test_disabled_metrics() {
        let config = MetricsConfig {
            enabled: false,
            ..Default::default()
        };

        assert!(init_metrics(&config).is_none());
    }
}
