//! Semantic router service
//!
//! Picks the workflow for a query by nearest labeled example, falling
//! back to literal/regex patterns and finally to the unrouted sentinel.
//! Route definitions are served from an in-process snapshot that is
//! written through to the fingerprint index and reloaded from it by
//! `refresh`, which the engine runs periodically.

use std::cmp::Ordering;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, warn};

use super::FingerprintIndex;
use crate::domain::fingerprint::NormalizedQuery;
use crate::domain::router::{
    FallbackPattern, RouteDecision, RouteDefinition, RouteSpec, RouteSummary, RouterConfig,
};
use crate::domain::workflow::WorkflowKind;
use crate::domain::DomainError;
use crate::infrastructure::observability::{record_degraded, record_route_decision};

/// Nearest-route selection with pattern fallback
#[derive(Debug)]
pub struct SemanticRouterService {
    index: Arc<FingerprintIndex>,
    config: RouterConfig,
    /// Declaration order; pattern matching walks it front to back
    routes: RwLock<Arc<Vec<RouteDefinition>>>,
}

impl SemanticRouterService {
    pub fn new(index: Arc<FingerprintIndex>, config: RouterConfig) -> Self {
        Self {
            index,
            config,
            routes: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    fn snapshot(&self) -> Arc<Vec<RouteDefinition>> {
        Arc::clone(&self.routes.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn update<F>(&self, change: F)
    where
        F: FnOnce(&mut Vec<RouteDefinition>),
    {
        let mut guard = self.routes.write().unwrap_or_else(PoisonError::into_inner);
        let mut routes = guard.as_ref().clone();
        change(&mut routes);
        *guard = Arc::new(routes);
    }

    /// Route a raw query
    ///
    /// If the query cannot be embedded only the pattern stage runs.
    pub async fn route(&self, query_text: &str) -> Result<RouteDecision, DomainError> {
        let query = NormalizedQuery::parse(query_text)?;

        match self.index.embed(&query).await {
            Ok(vector) => Ok(self.route_with_embedding(&query, Some(&vector))),
            Err(e) => {
                record_degraded("embedder");
                warn!(error = %e, "Router embedding failed, trying patterns only");
                Ok(self.route_with_embedding(&query, None))
            }
        }
    }

    /// Route a query whose embedding is already known (or unavailable)
    pub fn route_with_embedding(&self, query: &NormalizedQuery, vector: Option<&[f32]>) -> RouteDecision {
        let routes = self.snapshot();

        let decision = match vector.and_then(|v| nearest_route(&routes, v)) {
            Some((route, similarity)) if similarity >= self.config.similarity_threshold => {
                RouteDecision::vector(route.route_id(), similarity)
            }
            _ => routes
                .iter()
                .find(|route| route.matches_pattern(query.original(), query.normalized()))
                .map(|route| {
                    let confidence = vector
                        .and_then(|v| route.best_similarity(v))
                        .unwrap_or(0.0);
                    RouteDecision::pattern(route.route_id(), confidence)
                })
                .unwrap_or_else(RouteDecision::unrouted),
        };

        record_route_decision(decision.source);
        debug!(
            fingerprint = %query.fingerprint(),
            route_id = %decision.route_id,
            source = ?decision.source,
            confidence = decision.confidence,
            "Route decision"
        );
        decision
    }

    /// Record that routing `embedding` to `route_id` was correct
    ///
    /// The store append happens first, so the in-process snapshot never
    /// holds an example the store lost. Returns the new example count.
    pub async fn confirm(&self, route_id: &str, embedding: &[f32]) -> Result<usize, DomainError> {
        if self.get(route_id).is_none() {
            return Err(DomainError::not_found(format!("Route '{}' not found", route_id)));
        }

        let count = self.index.append_route_example(route_id, embedding).await?;

        self.update(|routes| {
            if let Some(route) = routes.iter_mut().find(|r| r.route_id() == route_id) {
                route.push_example(embedding.to_vec());
            }
        });

        info!(route_id, examples = count, "Confirmed route example");
        Ok(count)
    }

    /// Embed a raw query and confirm it as an example of `route_id`
    pub async fn confirm_query(&self, route_id: &str, query_text: &str) -> Result<usize, DomainError> {
        let query = NormalizedQuery::parse(query_text)?;
        let vector = self.index.embed(&query).await?;
        self.confirm(route_id, &vector).await
    }

    /// Create or replace a route from its declared form
    ///
    /// Example texts are embedded here; the definition is written to the
    /// store before it becomes visible to `route`.
    pub async fn register_route(&self, spec: &RouteSpec) -> Result<RouteSummary, DomainError> {
        let mut route = RouteDefinition::new(spec.route_id.clone(), spec.workflow);

        for pattern in &spec.fallback_patterns {
            route = route.with_pattern(FallbackPattern::from_spec(pattern)?);
        }

        for example in &spec.examples {
            let query = NormalizedQuery::parse(example)?;
            route = route.with_example(self.index.embed(&query).await?);
        }

        self.index.put_route(&route).await?;

        let summary = route.summary();
        self.update(move |routes| match routes.iter_mut().find(|r| r.route_id() == route.route_id()) {
            Some(existing) => *existing = route,
            None => routes.push(route),
        });

        info!(
            route_id = %summary.route_id,
            workflow = %summary.workflow,
            examples = summary.example_count,
            "Registered route"
        );
        Ok(summary)
    }

    /// Register declared routes that the store does not hold yet
    ///
    /// Routes already present keep their stored (possibly learned)
    /// examples. Returns how many routes were registered.
    pub async fn seed(&self, specs: &[RouteSpec]) -> Result<usize, DomainError> {
        let mut seeded = 0;

        for spec in specs {
            if self.index.get_route(&spec.route_id).await?.is_some() {
                debug!(route_id = %spec.route_id, "Route already stored, not seeding");
                continue;
            }
            self.register_route(spec).await?;
            seeded += 1;
        }

        Ok(seeded)
    }

    /// Reload every definition from the store
    ///
    /// Known routes keep their position; new ones are appended in route
    /// id order.
    pub async fn refresh(&self) -> Result<usize, DomainError> {
        let mut loaded = self.index.load_routes().await?;
        let count = loaded.len();

        self.update(move |routes| {
            let mut ordered = Vec::with_capacity(loaded.len());
            for known in routes.iter() {
                if let Some(pos) = loaded.iter().position(|r| r.route_id() == known.route_id()) {
                    ordered.push(loaded.remove(pos));
                }
            }
            ordered.append(&mut loaded);
            *routes = ordered;
        });

        debug!(routes = count, "Refreshed route definitions");
        Ok(count)
    }

    pub fn get(&self, route_id: &str) -> Option<RouteDefinition> {
        self.snapshot()
            .iter()
            .find(|route| route.route_id() == route_id)
            .cloned()
    }

    /// Workflow bound to `route_id`
    pub fn workflow_for(&self, route_id: &str) -> Option<WorkflowKind> {
        self.snapshot()
            .iter()
            .find(|route| route.route_id() == route_id)
            .map(RouteDefinition::workflow)
    }

    pub fn routes(&self) -> Vec<RouteSummary> {
        self.snapshot().iter().map(RouteDefinition::summary).collect()
    }
}

/// Route with the globally best example similarity
///
/// Ties go to the route with more examples, then to the smaller id.
fn nearest_route<'a>(routes: &'a [RouteDefinition], vector: &[f32]) -> Option<(&'a RouteDefinition, f32)> {
    routes
        .iter()
        .filter(|route| route.is_vector_eligible())
        .filter_map(|route| route.best_similarity(vector).map(|sim| (route, sim)))
        .max_by(|(a, sim_a), (b, sim_b)| {
            sim_a
                .partial_cmp(sim_b)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.example_count().cmp(&b.example_count()))
                .then_with(|| b.route_id().cmp(a.route_id()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::embedding::MockEmbedder;
    use crate::domain::router::{PatternSpec, RouteSource, UNROUTED};
    use crate::infrastructure::vector_store::InMemoryVectorStore;

    fn embedder() -> MockEmbedder {
        MockEmbedder::new(3)
            .with_vector("what's aapl's price?", vec![1.0, 0.0, 0.0])
            // cos = 0.90 to the price example
            .with_vector("what is apple's current price?", vec![0.9, 0.435_89, 0.0])
            .with_vector("latest tsla headlines", vec![0.0, 1.0, 0.0])
            .with_vector("write me a poem about the sea", vec![0.0, 0.0, 1.0])
            // cos = 0.6 to the price example
            .with_vector("quote for msft please", vec![0.6, 0.0, 0.8])
    }

    fn spec(route_id: &str, workflow: WorkflowKind, examples: &[&str], patterns: Vec<PatternSpec>) -> RouteSpec {
        RouteSpec {
            route_id: route_id.to_string(),
            workflow,
            examples: examples.iter().map(|e| e.to_string()).collect(),
            fallback_patterns: patterns,
        }
    }

    struct Fixture {
        router: SemanticRouterService,
        index: Arc<FingerprintIndex>,
        embedder: Arc<MockEmbedder>,
    }

    async fn fixture() -> Fixture {
        let embedder = Arc::new(embedder());
        let index = Arc::new(FingerprintIndex::new(
            Arc::new(InMemoryVectorStore::new()),
            embedder.clone(),
        ));
        let router = SemanticRouterService::new(index.clone(), RouterConfig::default());

        router
            .register_route(&spec(
                "price_lookup",
                WorkflowKind::MarketData,
                &["What's AAPL's price?"],
                vec![PatternSpec::Literal("quote".to_string())],
            ))
            .await
            .unwrap();
        router
            .register_route(&spec(
                "news",
                WorkflowKind::News,
                &["latest TSLA headlines"],
                vec![PatternSpec::Regex(r"(?i)\bnews\b".to_string())],
            ))
            .await
            .unwrap();

        Fixture {
            router,
            index,
            embedder,
        }
    }

    #[tokio::test]
    async fn test_similar_query_routes_by_vector() {
        let f = fixture().await;

        let decision = f.router.route("What is Apple's current price?").await.unwrap();

        assert_eq!(decision.route_id, "price_lookup");
        assert_eq!(decision.source, RouteSource::Vector);
        assert!((decision.confidence - 0.9).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_unrelated_query_is_unrouted() {
        let f = fixture().await;

        let decision = f.router.route("Write me a poem about the sea").await.unwrap();

        assert_eq!(decision.route_id, UNROUTED);
        assert_eq!(decision.source, RouteSource::Unrouted);
        assert!(!decision.is_routed());
    }

    #[tokio::test]
    async fn test_low_confidence_falls_back_to_patterns() {
        let f = fixture().await;

        let decision = f.router.route("Quote for MSFT please").await.unwrap();

        assert_eq!(decision.route_id, "price_lookup");
        assert_eq!(decision.source, RouteSource::Pattern);
        assert!((decision.confidence - 0.6).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_embedder_down_uses_patterns_only() {
        let f = fixture().await;
        f.embedder.set_error(Some("timeout".to_string()));

        let decision = f.router.route("Any news on NVDA?").await.unwrap();
        assert_eq!(decision.route_id, "news");
        assert_eq!(decision.source, RouteSource::Pattern);
        assert_eq!(decision.confidence, 0.0);

        let decision = f.router.route("What's AAPL's price?").await.unwrap();
        assert_eq!(decision.source, RouteSource::Unrouted);
    }

    #[tokio::test]
    async fn test_patterns_tested_in_declaration_order() {
        let f = fixture().await;
        f.router
            .register_route(&spec(
                "catch_all_quote",
                WorkflowKind::General,
                &[],
                vec![PatternSpec::Literal("quote".to_string())],
            ))
            .await
            .unwrap();

        let query = NormalizedQuery::parse("quote news").unwrap();
        let decision = f.router.route_with_embedding(&query, None);

        assert_eq!(decision.route_id, "price_lookup");
    }

    #[test]
    fn test_tie_prefers_more_examples_then_smaller_id() {
        let routes = vec![
            RouteDefinition::new("b", WorkflowKind::Risk).with_example(vec![1.0, 0.0]),
            RouteDefinition::new("a", WorkflowKind::Risk).with_example(vec![1.0, 0.0]),
        ];
        let (best, _) = nearest_route(&routes, &[1.0, 0.0]).unwrap();
        assert_eq!(best.route_id(), "a");

        let routes = vec![
            RouteDefinition::new("a", WorkflowKind::Risk).with_example(vec![1.0, 0.0]),
            RouteDefinition::new("z", WorkflowKind::Risk)
                .with_example(vec![1.0, 0.0])
                .with_example(vec![0.0, 1.0]),
        ];
        let (best, _) = nearest_route(&routes, &[1.0, 0.0]).unwrap();
        assert_eq!(best.route_id(), "z");
    }

    #[test]
    fn test_routes_without_examples_are_not_vector_candidates() {
        let routes = vec![RouteDefinition::new("empty", WorkflowKind::General)];
        assert!(nearest_route(&routes, &[1.0, 0.0]).is_none());
    }

    #[tokio::test]
    async fn test_confirm_appends_example_and_persists() {
        let f = fixture().await;

        let count = f
            .router
            .confirm_query("price_lookup", "Quote for MSFT please")
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(f.router.get("price_lookup").unwrap().example_count(), 2);

        // Learned example now routes by vector
        let decision = f.router.route("quote for msft please").await.unwrap();
        assert_eq!(decision.source, RouteSource::Vector);

        let stored = f.index.get_route("price_lookup").await.unwrap().unwrap();
        assert_eq!(stored.example_count(), 2);
    }

    #[tokio::test]
    async fn test_confirm_unknown_route() {
        let f = fixture().await;

        let err = f.router.confirm("nope", &[1.0, 0.0, 0.0]).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_refresh_reloads_from_store() {
        let f = fixture().await;
        let fresh = SemanticRouterService::new(f.index.clone(), RouterConfig::default());
        assert!(fresh.routes().is_empty());

        assert_eq!(fresh.refresh().await.unwrap(), 2);
        assert_eq!(fresh.workflow_for("news"), Some(WorkflowKind::News));

        let decision = fresh.route("What is Apple's current price?").await.unwrap();
        assert_eq!(decision.route_id, "price_lookup");
    }

    #[tokio::test]
    async fn test_seed_skips_stored_routes() {
        let f = fixture().await;
        f.router.confirm_query("news", "Quote for MSFT please").await.unwrap();

        let seeded = f
            .router
            .seed(&[
                spec("news", WorkflowKind::News, &["latest TSLA headlines"], vec![]),
                spec("risk", WorkflowKind::Risk, &[], vec![]),
            ])
            .await
            .unwrap();

        assert_eq!(seeded, 1);
        assert_eq!(f.router.get("news").unwrap().example_count(), 2);
        assert_eq!(f.router.routes().len(), 3);
    }

    #[tokio::test]
    async fn test_replica_sees_example_confirmed_by_another_after_refresh() {
        let f = fixture().await;
        let replica = SemanticRouterService::new(f.index.clone(), RouterConfig::default());
        replica.refresh().await.unwrap();

        f.router
            .confirm_query("price_lookup", "Quote for MSFT please")
            .await
            .unwrap();

        // Stale until it reloads
        assert_eq!(replica.get("price_lookup").unwrap().example_count(), 1);

        replica.refresh().await.unwrap();
        assert_eq!(replica.get("price_lookup").unwrap().example_count(), 2);
        let decision = replica.route("quote for msft please").await.unwrap();
        assert_eq!(decision.source, RouteSource::Vector);
        assert_eq!(decision.route_id, "price_lookup");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_confirms_lose_no_examples() {
        const CONFIRMS: usize = 32;
        let f = fixture().await;
        let router = Arc::new(f.router);

        let tasks: Vec<_> = (0..CONFIRMS)
            .map(|i| {
                let router = Arc::clone(&router);
                tokio::spawn(async move {
                    let x = i as f32 / CONFIRMS as f32;
                    router.confirm("price_lookup", &[1.0, x, 0.0]).await
                })
            })
            .collect();

        let mut counts: Vec<usize> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|task| task.unwrap().unwrap())
            .collect();
        counts.sort_unstable();

        // Every append saw a distinct list length
        assert_eq!(counts, (2..=CONFIRMS + 1).collect::<Vec<_>>());

        let stored = f.index.get_route("price_lookup").await.unwrap().unwrap();
        assert_eq!(stored.example_count(), CONFIRMS + 1);
        assert_eq!(router.get("price_lookup").unwrap().example_count(), CONFIRMS + 1);
    }
}
