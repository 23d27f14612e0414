//! Semantic cache service
//!
//! Answers "has this, or a near-identical query, already been answered?"
//! Lookups never fail because of the embedder or the store: those
//! failures are logged, counted, and reported as a miss.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::FingerprintIndex;
use crate::domain::fingerprint::NormalizedQuery;
use crate::domain::semantic_cache::{
    CacheEntry, CacheHit, CacheLookup, SemanticCacheConfig, SemanticCacheStats, TtlClass,
};
use crate::domain::{Clock, DomainError};
use crate::infrastructure::observability::{
    record_cache_lookup, record_degraded, record_sweep, CacheLookupResult,
};

/// What a `store` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Inserted,
    /// A different response replaced the old one
    Replaced,
    /// Content-identical to the fresh entry already stored
    Unchanged,
    /// Caching is switched off
    Disabled,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    degraded: AtomicU64,
    swept: AtomicU64,
}

/// Embedding-keyed response cache
#[derive(Debug)]
pub struct SemanticCacheService {
    index: Arc<FingerprintIndex>,
    clock: Arc<dyn Clock>,
    config: SemanticCacheConfig,
    counters: Counters,
}

impl SemanticCacheService {
    pub fn new(index: Arc<FingerprintIndex>, clock: Arc<dyn Clock>, config: SemanticCacheConfig) -> Self {
        Self {
            index,
            clock,
            config,
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &SemanticCacheConfig {
        &self.config
    }

    /// Look up a raw query
    ///
    /// Only malformed input is an error; everything else ends in a hit
    /// or a miss.
    pub async fn lookup(&self, query_text: &str) -> Result<CacheLookup, DomainError> {
        let query = NormalizedQuery::parse(query_text)?;

        if !self.config.enabled {
            return Ok(CacheLookup::Miss);
        }

        let started = Instant::now();
        match self.index.embed(&query).await {
            Ok(vector) => Ok(self.lookup_with_embedding(&query, &vector).await),
            Err(e) => {
                self.degrade("embedder", &e, started);
                Ok(CacheLookup::Miss)
            }
        }
    }

    /// Look up a query whose embedding is already known
    pub async fn lookup_with_embedding(&self, query: &NormalizedQuery, vector: &[f32]) -> CacheLookup {
        if !self.config.enabled {
            return CacheLookup::Miss;
        }

        let started = Instant::now();
        match self.find_hit(vector).await {
            Ok(Some(hit)) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                record_cache_lookup(CacheLookupResult::Hit, started.elapsed());
                debug!(
                    fingerprint = %query.fingerprint(),
                    matched = %hit.entry.fingerprint(),
                    similarity = hit.similarity,
                    hit_count = hit.entry.hit_count(),
                    "Semantic cache hit"
                );
                CacheLookup::Hit(hit)
            }
            Ok(None) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                record_cache_lookup(CacheLookupResult::Miss, started.elapsed());
                debug!(fingerprint = %query.fingerprint(), "Semantic cache miss");
                CacheLookup::Miss
            }
            Err(e) => {
                self.degrade("vector_store", &e, started);
                CacheLookup::Miss
            }
        }
    }

    async fn find_hit(&self, vector: &[f32]) -> Result<Option<CacheHit>, DomainError> {
        let matches = self.index.nearest_entries(vector, self.config.top_k).await?;
        let now = self.clock.now();

        // Expiry is checked here rather than in the store query, which
        // cannot filter on TTL
        let mut candidates: Vec<(CacheEntry, f32)> = matches
            .into_iter()
            .filter(|m| m.similarity >= self.config.similarity_threshold)
            .filter_map(|m| {
                let similarity = m.similarity;
                CacheEntry::from_parts(Vec::new(), m.metadata)
                    .map_err(|e| warn!(key = %m.key, error = %e, "Ignoring malformed cache match"))
                    .ok()
                    .map(|entry| (entry, similarity))
            })
            .filter(|(entry, _)| !entry.is_expired_at(now))
            .collect();

        candidates.sort_by(|(a, sim_a), (b, sim_b)| {
            sim_b
                .partial_cmp(sim_a)
                .unwrap_or(CmpOrdering::Equal)
                .then_with(|| b.created_at().cmp(&a.created_at()))
        });

        for (candidate, similarity) in candidates {
            // Re-read the full record; it may have been replaced or swept
            let Some(mut entry) = self.index.get_entry(candidate.fingerprint()).await? else {
                continue;
            };
            if entry.is_expired_at(now) {
                continue;
            }

            self.record_hit(&mut entry, now).await;
            return Ok(Some(CacheHit { entry, similarity }));
        }

        Ok(None)
    }

    /// Fresh entry stored under exactly this query's fingerprint
    ///
    /// Counts as a hit on the entry but not in the lookup counters.
    /// Store failures read as "nothing cached".
    pub async fn exact_hit(&self, query: &NormalizedQuery) -> Option<CacheHit> {
        if !self.config.enabled {
            return None;
        }

        let now = self.clock.now();
        match self.index.get_entry(query.fingerprint()).await {
            Ok(Some(mut entry)) if !entry.is_expired_at(now) => {
                self.record_hit(&mut entry, now).await;
                Some(CacheHit {
                    entry,
                    similarity: 1.0,
                })
            }
            Ok(_) => None,
            Err(e) => {
                debug!(fingerprint = %query.fingerprint(), error = %e, "Exact cache read failed");
                None
            }
        }
    }

    async fn record_hit(&self, entry: &mut CacheEntry, now: DateTime<Utc>) {
        entry.record_hit(now);

        // Counters are best-effort; a lost update is tolerated
        if let Err(e) = self.index.touch_entry(entry).await {
            warn!(fingerprint = %entry.fingerprint(), error = %e, "Failed to record cache hit");
        }
    }

    /// Count a lookup that could not run because the query had no embedding
    pub(crate) fn miss_without_embedding(&self, error: &DomainError) -> CacheLookup {
        if self.config.enabled {
            self.degrade("embedder", error, Instant::now());
        }
        CacheLookup::Miss
    }

    fn degrade(&self, component: &'static str, error: &DomainError, started: Instant) {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        self.counters.degraded.fetch_add(1, Ordering::Relaxed);
        record_degraded(component);
        record_cache_lookup(CacheLookupResult::Degraded, started.elapsed());
        warn!(component, error = %error, "Semantic cache degraded to miss");
    }

    /// Store the response for a query
    ///
    /// Storing content identical to a fresh entry is a no-op. Otherwise
    /// the new response replaces the old one, keeping its embedding and
    /// hit count and restarting its TTL.
    pub async fn store(
        &self,
        query: &NormalizedQuery,
        embedding: Vec<f32>,
        payload: Value,
        ttl_class: TtlClass,
    ) -> Result<StoreOutcome, DomainError> {
        if !self.config.enabled {
            return Ok(StoreOutcome::Disabled);
        }

        self.index.check_vector(&embedding)?;

        let now = self.clock.now();
        let fresh = CacheEntry::new(
            query.fingerprint().clone(),
            embedding,
            query.normalized(),
            payload,
            ttl_class,
            self.config.ttl_for(ttl_class),
            now,
        );

        let outcome = match self.index.get_entry(query.fingerprint()).await? {
            Some(existing) if existing.same_content(&fresh) && !existing.is_expired_at(now) => {
                return Ok(StoreOutcome::Unchanged);
            }
            Some(existing) => {
                self.index.put_entry(&existing.replaced_by(fresh)).await?;
                StoreOutcome::Replaced
            }
            None => {
                self.index.put_entry(&fresh).await?;
                StoreOutcome::Inserted
            }
        };

        debug!(
            fingerprint = %query.fingerprint(),
            ttl_class = ttl_class.as_str(),
            outcome = ?outcome,
            "Stored semantic cache entry"
        );
        Ok(outcome)
    }

    /// Drop the entry stored for a query
    pub async fn invalidate(&self, query_text: &str) -> Result<bool, DomainError> {
        let query = NormalizedQuery::parse(query_text)?;
        let removed = self.index.delete_entry(query.fingerprint()).await?;

        if removed {
            info!(fingerprint = %query.fingerprint(), "Invalidated semantic cache entry");
        }
        Ok(removed)
    }

    /// Delete every entry, returning how many were removed
    pub async fn clear(&self) -> Result<usize, DomainError> {
        let entries = self.index.scan_entries().await?;
        let mut removed = 0;

        for entry in &entries {
            if self.index.delete_entry(entry.fingerprint()).await? {
                removed += 1;
            }
        }

        info!(removed, "Cleared semantic cache");
        Ok(removed)
    }

    /// Physically delete entries whose TTL has elapsed
    pub async fn sweep(&self) -> Result<usize, DomainError> {
        let now = self.clock.now();
        let expired: Vec<CacheEntry> = self
            .index
            .scan_entries()
            .await?
            .into_iter()
            .filter(|entry| entry.is_expired_at(now))
            .collect();

        let mut deleted = 0;
        for stale in &expired {
            // Skip entries refreshed since the scan
            match self.index.get_entry(stale.fingerprint()).await? {
                Some(current) if current.is_expired_at(now) => {
                    if self.index.delete_entry(stale.fingerprint()).await? {
                        deleted += 1;
                    }
                }
                _ => {}
            }
        }

        self.counters.swept.fetch_add(deleted as u64, Ordering::Relaxed);
        record_sweep(deleted);
        if deleted > 0 {
            info!(deleted, "Swept expired semantic cache entries");
        }
        Ok(deleted)
    }

    pub async fn stats(&self) -> Result<SemanticCacheStats, DomainError> {
        let total_entries = self.index.scan_entries().await?.len();

        Ok(SemanticCacheStats {
            total_entries,
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            degraded: self.counters.degraded.load(Ordering::Relaxed),
            swept: self.counters.swept.load(Ordering::Relaxed),
        })
    }
}
