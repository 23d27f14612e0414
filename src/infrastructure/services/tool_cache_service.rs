//! Tool cache service
//!
//! Exact-match memoization of tool invocations. Keys are derived from
//! the tool name and canonicalized arguments; concurrent misses for
//! the same key share one computation.
//!
//! Nothing in the HTTP service calls it: workflows run out of process
//! behind [`WorkflowExecutor`](crate::domain::workflow::WorkflowExecutor).
//! It is the library surface for tools that run in the embedding
//! process, reached through [`EngineHandle::tool_cache`](super::EngineHandle).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::cache::{Cache, ToolKey};
use crate::domain::DomainError;
use crate::infrastructure::observability::{record_degraded, record_tool_cache, ToolCacheResult};
use crate::infrastructure::singleflight::Singleflight;

/// Memoizer for tool outputs
#[derive(Debug)]
pub struct ToolCacheService {
    cache: Arc<dyn Cache>,
    flight: Singleflight<Value>,
    default_ttl: Duration,
}

impl ToolCacheService {
    pub fn new(cache: Arc<dyn Cache>, default_ttl: Duration) -> Self {
        Self {
            cache,
            flight: Singleflight::new("tool_cache"),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Return the cached output of `tool(args)` or compute and cache it
    ///
    /// `compute` runs only on a genuine miss. When the backend is
    /// unreachable the result is computed but not cached.
    pub async fn get_or_compute<F, Fut>(
        &self,
        tool: &str,
        args: &Value,
        ttl: Duration,
        compute: F,
    ) -> Result<Value, DomainError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, DomainError>> + Send + 'static,
    {
        let key = ToolKey::new(tool, args)?;

        let cached = match self.cache.get_raw(key.as_str()).await {
            Ok(raw) => raw,
            Err(e) => {
                record_degraded("tool_cache");
                record_tool_cache(tool, ToolCacheResult::Bypassed);
                warn!(tool, error = %e, "Tool cache unavailable, computing uncached");
                return self.flight.run(key.as_str(), compute).await;
            }
        };

        if let Some(value) = cached.as_deref().and_then(|raw| decode(&key, raw)) {
            record_tool_cache(tool, ToolCacheResult::Hit);
            debug!(tool, key = %key, "Tool cache hit");
            return Ok(value);
        }

        record_tool_cache(tool, ToolCacheResult::Miss);

        let cache = Arc::clone(&self.cache);
        let leader_key = key.clone();
        self.flight
            .run(key.as_str(), move || {
                let computation = compute();
                async move {
                    // A run that finished just before we joined may have
                    // filled the key already
                    if let Ok(Some(raw)) = cache.get_raw(leader_key.as_str()).await {
                        if let Some(value) = decode(&leader_key, &raw) {
                            return Ok(value);
                        }
                    }

                    let value = computation.await?;

                    if let Err(e) = cache.set_raw(leader_key.as_str(), &value.to_string(), ttl).await {
                        warn!(key = %leader_key, error = %e, "Failed to cache tool result");
                    }
                    Ok(value)
                }
            })
            .await
    }

    /// Same as [`get_or_compute`](Self::get_or_compute) with the default TTL
    pub async fn get_or_compute_default<F, Fut>(
        &self,
        tool: &str,
        args: &Value,
        compute: F,
    ) -> Result<Value, DomainError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, DomainError>> + Send + 'static,
    {
        self.get_or_compute(tool, args, self.default_ttl, compute).await
    }

    /// Drop one memoized invocation
    pub async fn invalidate(&self, tool: &str, args: &Value) -> Result<bool, DomainError> {
        let key = ToolKey::new(tool, args)?;
        self.cache.delete(key.as_str()).await
    }

    /// Drop every memoized invocation of `tool`
    pub async fn invalidate_tool(&self, tool: &str) -> Result<usize, DomainError> {
        self.cache.delete_pattern(&ToolKey::tool_pattern(tool)).await
    }

    /// Fail in-flight computations and refuse new ones
    pub fn shutdown(&self) {
        self.flight.shutdown();
    }
}

fn decode(key: &ToolKey, raw: &str) -> Option<Value> {
    serde_json::from_str(raw)
        .map_err(|e| warn!(key = %key, error = %e, "Ignoring undecodable tool cache value"))
        .ok()
}
