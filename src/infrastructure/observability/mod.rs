//! Observability infrastructure - Prometheus metrics

mod config;
mod metrics;

pub use config::MetricsConfig;
pub use metrics::{
    create_metrics_router, init_metrics, record_cache_lookup, record_degraded,
    record_http_request, record_route_decision, record_singleflight_join, record_sweep,
    record_tool_cache, CacheLookupResult, PrometheusMetrics, ToolCacheResult,
};
