//! Per-request decision: cached answer, known workflow, or full agent
//!
//! The query is embedded once and the embedding feeds the cache lookup
//! and the router concurrently. On a miss the chosen workflow runs under
//! a per-fingerprint singleflight, and its leader stores the response
//! and confirms the route before releasing the waiters. A leader first
//! checks for an entry stored under the same fingerprint by a flight
//! that finished after this caller's lookup.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{FingerprintIndex, SemanticCacheService, SemanticRouterService};
use crate::domain::fingerprint::NormalizedQuery;
use crate::domain::router::{RouteDecision, RouteSource};
use crate::domain::semantic_cache::{CacheHit, CacheLookup};
use crate::domain::workflow::{WorkflowExecutor, WorkflowKind, WorkflowOutcome};
use crate::domain::DomainError;
use crate::infrastructure::singleflight::Singleflight;

/// Where the answer of a decision came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// Served from the semantic cache
    Cache,
    /// A routed workflow computed it
    Workflow,
    /// Nothing matched; the general agent computed it
    FullAgent,
}

/// Outcome of one decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub source: DecisionSource,
    pub fingerprint: String,
    pub route_id: String,
    pub route_source: RouteSource,
    /// Router confidence
    pub confidence: f32,
    /// Similarity of the cache entry that answered, on cache hits
    pub similarity: Option<f32>,
    pub payload: Value,
    pub hit_count: u64,
}

/// What a singleflight leader produced
#[derive(Debug, Clone)]
enum Computed {
    Workflow(WorkflowOutcome),
    /// Stored by an earlier flight for the same fingerprint
    Cached(CacheHit),
}

/// Cache, router and workflow dispatch for one query
pub struct DecisionEngine {
    index: Arc<FingerprintIndex>,
    cache: Arc<SemanticCacheService>,
    router: Arc<SemanticRouterService>,
    executor: Arc<dyn WorkflowExecutor>,
    flight: Singleflight<Computed>,
}

impl fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("flight", &self.flight)
            .finish_non_exhaustive()
    }
}

impl DecisionEngine {
    pub fn new(
        index: Arc<FingerprintIndex>,
        cache: Arc<SemanticCacheService>,
        router: Arc<SemanticRouterService>,
        executor: Arc<dyn WorkflowExecutor>,
    ) -> Self {
        Self {
            index,
            cache,
            router,
            executor,
            flight: Singleflight::new("decision"),
        }
    }

    /// Decide and, on a miss, compute the answer for `query_text`
    ///
    /// Only malformed input and workflow failures are errors; an
    /// unavailable embedder or store just removes the shortcuts.
    pub async fn decide(&self, query_text: &str) -> Result<Decision, DomainError> {
        let query = NormalizedQuery::parse(query_text)?;

        let vector = match self.index.embed(&query).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                self.cache.miss_without_embedding(&e);
                None
            }
        };

        let (lookup, route) = match vector.as_deref() {
            Some(v) => tokio::join!(self.cache.lookup_with_embedding(&query, v), async {
                self.router.route_with_embedding(&query, Some(v))
            }),
            None => (CacheLookup::Miss, self.router.route_with_embedding(&query, None)),
        };

        if let CacheLookup::Hit(hit) = lookup {
            return Ok(cached_decision(&query, route, hit));
        }

        let (source, workflow) = match route.is_routed() {
            true => (
                DecisionSource::Workflow,
                self.router
                    .workflow_for(&route.route_id)
                    .unwrap_or(WorkflowKind::General),
            ),
            false => (DecisionSource::FullAgent, WorkflowKind::General),
        };

        let outcome = match self.compute(&query, vector, &route, workflow).await? {
            Computed::Workflow(outcome) => outcome,
            Computed::Cached(hit) => return Ok(cached_decision(&query, route, hit)),
        };

        Ok(Decision {
            source,
            fingerprint: query.fingerprint().to_string(),
            route_id: route.route_id,
            route_source: route.source,
            confidence: route.confidence,
            similarity: None,
            payload: outcome.payload,
            hit_count: 0,
        })
    }

    async fn compute(
        &self,
        query: &NormalizedQuery,
        vector: Option<Vec<f32>>,
        route: &RouteDecision,
        workflow: WorkflowKind,
    ) -> Result<Computed, DomainError> {
        let executor = Arc::clone(&self.executor);
        let cache = Arc::clone(&self.cache);
        let router = Arc::clone(&self.router);
        let query = query.clone();
        let route = route.clone();

        let key = query.fingerprint().to_string();
        self.flight
            .run(&key, move || async move {
                if let Some(hit) = cache.exact_hit(&query).await {
                    debug!(
                        fingerprint = %query.fingerprint(),
                        "Answered by an entry stored since the lookup"
                    );
                    return Ok(Computed::Cached(hit));
                }

                info!(
                    fingerprint = %query.fingerprint(),
                    route_id = %route.route_id,
                    workflow = %workflow,
                    "Running workflow"
                );

                let outcome = executor
                    .execute(workflow, &route.route_id, query.original())
                    .await?;

                let Some(vector) = vector else {
                    return Ok(Computed::Workflow(outcome));
                };

                if !outcome.success {
                    warn!(
                        route_id = %route.route_id,
                        workflow = %workflow,
                        "Workflow rejected the query, not caching"
                    );
                    return Ok(Computed::Workflow(outcome));
                }

                if let Err(e) = cache
                    .store(&query, vector.clone(), outcome.payload.clone(), workflow.ttl_class())
                    .await
                {
                    warn!(fingerprint = %query.fingerprint(), error = %e, "Failed to cache workflow response");
                }

                if matches!(route.source, RouteSource::Vector | RouteSource::Pattern) {
                    if let Err(e) = router.confirm(&route.route_id, &vector).await {
                        warn!(route_id = %route.route_id, error = %e, "Failed to confirm route");
                    }
                }

                Ok(Computed::Workflow(outcome))
            })
            .await
    }

    /// Fail pending waiters with a shutdown error and refuse new work
    pub fn shutdown(&self) {
        self.flight.shutdown();
    }
}

fn cached_decision(query: &NormalizedQuery, route: RouteDecision, hit: CacheHit) -> Decision {
    Decision {
        source: DecisionSource::Cache,
        fingerprint: query.fingerprint().to_string(),
        route_id: route.route_id,
        route_source: route.source,
        confidence: route.confidence,
        similarity: Some(hit.similarity),
        payload: hit.entry.response_payload().clone(),
        hit_count: hit.entry.hit_count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::mock::ManualClock;
    use crate::domain::embedding::MockEmbedder;
    use crate::domain::router::{PatternSpec, RouteSpec, RouterConfig, UNROUTED};
    use crate::domain::semantic_cache::SemanticCacheConfig;
    use crate::domain::workflow::MockWorkflowExecutor;
    use crate::infrastructure::vector_store::{InMemoryVectorStore, LaggyVectorStore};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Executor that answers after a delay and counts its runs
    struct SlowExecutor {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl WorkflowExecutor for SlowExecutor {
        async fn execute(
            &self,
            workflow: WorkflowKind,
            _route_id: &str,
            _query: &str,
        ) -> Result<WorkflowOutcome, DomainError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(WorkflowOutcome::succeeded(json!({"workflow": workflow.as_str()})))
        }
    }

    struct Fixture {
        engine: DecisionEngine,
        router: Arc<SemanticRouterService>,
        embedder: Arc<MockEmbedder>,
        store: Arc<InMemoryVectorStore>,
    }

    async fn fixture(executor: Arc<dyn WorkflowExecutor>) -> Fixture {
        let embedder = Arc::new(
            MockEmbedder::new(3)
                .with_vector("what's aapl's price?", vec![1.0, 0.0, 0.0])
                .with_vector("what is apple's current price?", vec![0.9, 0.435_89, 0.0])
                .with_vector("quote for msft please", vec![0.6, 0.0, 0.8])
                .with_vector("write me a poem", vec![0.0, 0.0, 1.0]),
        );
        let store = Arc::new(InMemoryVectorStore::new());
        let index = Arc::new(FingerprintIndex::new(store.clone(), embedder.clone()));
        let cache = Arc::new(SemanticCacheService::new(
            index.clone(),
            Arc::new(ManualClock::new()),
            SemanticCacheConfig::default(),
        ));
        let router = Arc::new(SemanticRouterService::new(index.clone(), RouterConfig::default()));

        router
            .register_route(&RouteSpec {
                route_id: "price_lookup".to_string(),
                workflow: WorkflowKind::MarketData,
                examples: vec!["What's AAPL's price?".to_string()],
                fallback_patterns: vec![PatternSpec::Literal("quote".to_string())],
            })
            .await
            .unwrap();

        Fixture {
            engine: DecisionEngine::new(index, cache, router.clone(), executor),
            router,
            embedder,
            store,
        }
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let mut executor = MockWorkflowExecutor::new();
        executor
            .expect_execute()
            .withf(|workflow, route_id, query| {
                *workflow == WorkflowKind::MarketData
                    && route_id == "price_lookup"
                    && query == "What is Apple's current price?"
            })
            .times(1)
            .returning(|_, _, _| Ok(WorkflowOutcome::succeeded(json!({"price": 189.12}))));
        let f = fixture(Arc::new(executor)).await;

        let first = f.engine.decide("What is Apple's current price?").await.unwrap();
        assert_eq!(first.source, DecisionSource::Workflow);
        assert_eq!(first.route_id, "price_lookup");
        assert_eq!(first.route_source, RouteSource::Vector);
        assert_eq!(first.payload, json!({"price": 189.12}));

        let second = f.engine.decide("what is apple's  current price?").await.unwrap();
        assert_eq!(second.source, DecisionSource::Cache);
        assert_eq!(second.hit_count, 1);
        assert_eq!(second.payload, json!({"price": 189.12}));
        assert!(second.similarity.unwrap() > 0.99);
    }

    #[tokio::test]
    async fn test_unrouted_goes_to_full_agent() {
        let mut executor = MockWorkflowExecutor::new();
        executor
            .expect_execute()
            .withf(|workflow, route_id, _| *workflow == WorkflowKind::General && route_id == UNROUTED)
            .times(1)
            .returning(|_, _, _| Ok(WorkflowOutcome::succeeded(json!("a poem"))));
        let f = fixture(Arc::new(executor)).await;

        let decision = f.engine.decide("Write me a poem").await.unwrap();

        assert_eq!(decision.source, DecisionSource::FullAgent);
        assert_eq!(decision.route_id, UNROUTED);
        // Unrouted answers are still cached, but nothing is learned
        assert_eq!(f.router.get("price_lookup").unwrap().example_count(), 1);
        assert_eq!(f.store.len(), 2);
    }

    #[tokio::test]
    async fn test_success_confirms_pattern_route() {
        let mut executor = MockWorkflowExecutor::new();
        executor
            .expect_execute()
            .times(1)
            .returning(|_, _, _| Ok(WorkflowOutcome::succeeded(json!({"price": 411.2}))));
        let f = fixture(Arc::new(executor)).await;

        let decision = f.engine.decide("Quote for MSFT please").await.unwrap();

        assert_eq!(decision.route_source, RouteSource::Pattern);
        assert_eq!(f.router.get("price_lookup").unwrap().example_count(), 2);
    }

    #[tokio::test]
    async fn test_rejected_outcome_is_neither_cached_nor_learned() {
        let mut executor = MockWorkflowExecutor::new();
        executor
            .expect_execute()
            .times(2)
            .returning(|_, _, _| Ok(WorkflowOutcome::rejected(json!({"error": "not a quote"}))));
        let f = fixture(Arc::new(executor)).await;

        f.engine.decide("Quote for MSFT please").await.unwrap();
        let again = f.engine.decide("Quote for MSFT please").await.unwrap();

        assert_eq!(again.source, DecisionSource::Workflow);
        assert_eq!(f.router.get("price_lookup").unwrap().example_count(), 1);
    }

    #[tokio::test]
    async fn test_embedder_outage_still_answers() {
        let mut executor = MockWorkflowExecutor::new();
        executor
            .expect_execute()
            .withf(|workflow, _, _| *workflow == WorkflowKind::MarketData)
            .times(1)
            .returning(|_, _, _| Ok(WorkflowOutcome::succeeded(json!(1))));
        let f = fixture(Arc::new(executor)).await;
        f.embedder.set_error(Some("503".to_string()));

        let decision = f.engine.decide("quote for AMZN").await.unwrap();

        assert_eq!(decision.source, DecisionSource::Workflow);
        assert_eq!(decision.route_source, RouteSource::Pattern);
        // Only the route record; nothing was cached
        assert_eq!(f.store.len(), 1);
    }

    #[tokio::test]
    async fn test_workflow_failure_propagates() {
        let mut executor = MockWorkflowExecutor::new();
        executor
            .expect_execute()
            .returning(|_, _, _| Err(DomainError::computation_failed("workflow crashed")));
        let f = fixture(Arc::new(executor)).await;

        let err = f.engine.decide("What's AAPL's price?").await.unwrap_err();
        assert!(matches!(err, DomainError::ComputationFailed { .. }));
    }

    #[tokio::test]
    async fn test_malformed_query() {
        let f = fixture(Arc::new(MockWorkflowExecutor::new())).await;

        let err = f.engine.decide(" \t ").await.unwrap_err();
        assert!(matches!(err, DomainError::MalformedInput { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_identical_queries_run_workflow_once() {
        let executor = Arc::new(SlowExecutor {
            runs: AtomicUsize::new(0),
        });
        let f = Arc::new(fixture(executor.clone()).await);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let f = Arc::clone(&f);
                tokio::spawn(async move { f.engine.decide("What's AAPL's price?").await })
            })
            .collect();

        for task in futures::future::join_all(tasks).await {
            let decision = task.unwrap().unwrap();
            assert_eq!(decision.payload, json!({"workflow": "market_data"}));
        }
        assert_eq!(executor.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_refuses_new_work() {
        let f = fixture(Arc::new(MockWorkflowExecutor::new())).await;
        f.engine.shutdown();

        let err = f.engine.decide("Write me a poem").await.unwrap_err();
        assert_eq!(err, DomainError::Shutdown);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_late_miss_reuses_answer_of_finished_flight() {
        let executor = Arc::new(SlowExecutor {
            runs: AtomicUsize::new(0),
        });
        let store = Arc::new(LaggyVectorStore::default());
        let embedder = Arc::new(MockEmbedder::new(3).with_vector("write me a poem", vec![0.0, 0.0, 1.0]));
        let index = Arc::new(FingerprintIndex::new(store.clone(), embedder));
        let cache = Arc::new(SemanticCacheService::new(
            index.clone(),
            Arc::new(ManualClock::new()),
            SemanticCacheConfig::default(),
        ));
        let router = Arc::new(SemanticRouterService::new(index.clone(), RouterConfig::default()));
        let engine = Arc::new(DecisionEngine::new(index, cache, router, executor.clone()));

        let first = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.decide("Write me a poem").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        // This caller's lookup sees the empty store but only returns once
        // the first workflow run has been stored and released
        store.ann_reply_delay_ms.store(150, Ordering::SeqCst);
        let late = engine.decide("Write me a poem").await.unwrap();
        let first = first.await.unwrap().unwrap();

        assert_eq!(executor.runs.load(Ordering::SeqCst), 1);
        assert_eq!(first.source, DecisionSource::FullAgent);
        assert_eq!(late.source, DecisionSource::Cache);
        assert_eq!(late.payload, first.payload);
        assert_eq!(late.hit_count, 1);
    }
}
