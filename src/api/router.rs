use axum::{middleware, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use super::admin;
use super::health;
use super::middleware::{logging_middleware, metrics_middleware};
use super::state::AppState;
use super::v1;
use crate::infrastructure::observability::{create_metrics_router, PrometheusMetrics};

/// Router with only the stateless probes
pub fn create_router() -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/live", get(health::live_check))
        .layer(TraceLayer::new_for_http())
}

/// Create the full router with application state
///
/// `/metrics` is mounted only when a Prometheus recorder was installed.
pub fn create_router_with_state(
    state: AppState,
    metrics: Option<(PrometheusMetrics, &str)>,
) -> Router {
    let mut router = Router::new()
        // Probes
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        // Decision API
        .nest("/v1", v1::create_v1_router())
        // Admin API
        .nest("/admin", admin::create_admin_router())
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        .with_state(state);

    if let Some((metrics, path)) = metrics {
        router = router.merge(create_metrics_router(metrics, path));
    }

    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(CorsLayer::permissive()),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::AppConfig;
    use crate::domain::embedding::MockEmbedder;
    use crate::domain::router::{PatternSpec, RouteSpec};
    use crate::domain::workflow::{MockWorkflowExecutor, WorkflowKind, WorkflowOutcome};
    use crate::infrastructure::services::{test_support, EngineHandle};

    async fn app(executor: MockWorkflowExecutor) -> Router {
        let mut config = AppConfig::default();
        config.engine.embedding_dimension = 2;
        config.routes = vec![RouteSpec {
            route_id: "company_news".to_string(),
            workflow: WorkflowKind::News,
            examples: vec!["latest news on tesla".to_string()],
            fallback_patterns: vec![PatternSpec::Literal("headlines".to_string())],
        }];

        let embedder = MockEmbedder::new(2)
            .with_vector("latest news on tesla", vec![1.0, 0.0])
            .with_vector("tesla news today", vec![0.98, 0.1])
            .with_vector("how do i bake bread", vec![0.0, 1.0]);

        let engine = EngineHandle::start(&config, test_support::components(embedder, executor))
            .await
            .unwrap();

        create_router_with_state(AppState::new(Arc::new(engine)), None)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, json)
    }

    #[tokio::test]
    async fn test_probes() {
        let app = app(MockWorkflowExecutor::new()).await;

        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = send(&app, Method::GET, "/ready", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"][0]["name"], "vector_store");
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let app = app(MockWorkflowExecutor::new()).await;

        let response = app
            .oneshot(Request::builder().uri("/live").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_decide_then_cached() {
        let mut executor = MockWorkflowExecutor::new();
        executor
            .expect_execute()
            .withf(|workflow, route_id, _| *workflow == WorkflowKind::News && route_id == "company_news")
            .times(1)
            .returning(|_, _, _| Ok(WorkflowOutcome::succeeded(json!({"headlines": ["a", "b"]}))));
        let app = app(executor).await;

        let (status, first) =
            send(&app, Method::POST, "/v1/decide", Some(json!({"query": "Tesla news today"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["source"], "workflow");
        assert_eq!(first["route_id"], "company_news");

        let (status, second) =
            send(&app, Method::POST, "/v1/decide", Some(json!({"query": "tesla news   today"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["source"], "cache");
        assert_eq!(second["payload"], json!({"headlines": ["a", "b"]}));

        let (_, lookup) =
            send(&app, Method::POST, "/v1/cache/lookup", Some(json!({"query": "tesla news today"}))).await;
        assert_eq!(lookup["hit"], true);

        let (_, stats) = send(&app, Method::GET, "/admin/cache/stats", None).await;
        assert_eq!(stats["total_entries"], 1);
    }

    #[tokio::test]
    async fn test_empty_query_is_bad_request() {
        let app = app(MockWorkflowExecutor::new()).await;

        let (status, body) = send(&app, Method::POST, "/v1/decide", Some(json!({"query": "   "}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "invalid_request_error");
    }

    #[tokio::test]
    async fn test_workflow_failure_is_bad_gateway() {
        let mut executor = MockWorkflowExecutor::new();
        executor
            .expect_execute()
            .returning(|_, _, _| Err(crate::domain::DomainError::computation_failed("news service down")));
        let app = app(executor).await;

        let (status, body) =
            send(&app, Method::POST, "/v1/decide", Some(json!({"query": "tesla news today"}))).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "computation_failed");
    }

    #[tokio::test]
    async fn test_route_and_confirm() {
        let app = app(MockWorkflowExecutor::new()).await;

        let (status, routed) =
            send(&app, Method::POST, "/v1/route", Some(json!({"query": "tesla news today"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(routed["route_id"], "company_news");
        assert_eq!(routed["source"], "vector");
        assert_eq!(routed["workflow"], "news");

        let (_, unrouted) =
            send(&app, Method::POST, "/v1/route", Some(json!({"query": "how do i bake bread"}))).await;
        assert_eq!(unrouted["source"], "unrouted");
        assert!(unrouted.get("workflow").is_none());

        let (status, confirmed) = send(
            &app,
            Method::POST,
            "/v1/routes/company_news/confirm",
            Some(json!({"query": "tesla news today"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(confirmed["example_count"], 2);

        let (_, routes) = send(&app, Method::GET, "/admin/routes", None).await;
        assert_eq!(routes["routes"][0]["example_count"], 2);
    }

    #[tokio::test]
    async fn test_confirm_errors() {
        let app = app(MockWorkflowExecutor::new()).await;

        let (status, _) = send(
            &app,
            Method::POST,
            "/v1/routes/no_such_route/confirm",
            Some(json!({"embedding": [1.0, 0.0]})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            Method::POST,
            "/v1/routes/company_news/confirm",
            Some(json!({"embedding": [1.0, 0.0, 0.0]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) =
            send(&app, Method::POST, "/v1/routes/company_news/confirm", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cache_admin() {
        let mut executor = MockWorkflowExecutor::new();
        executor
            .expect_execute()
            .returning(|_, _, _| Ok(WorkflowOutcome::succeeded(json!("ok"))));
        let app = app(executor).await;

        send(&app, Method::POST, "/v1/decide", Some(json!({"query": "tesla news today"}))).await;
        send(&app, Method::POST, "/v1/decide", Some(json!({"query": "how do i bake bread"}))).await;

        let (_, invalidated) = send(
            &app,
            Method::POST,
            "/admin/cache/invalidate",
            Some(json!({"query": "TESLA news today"})),
        )
        .await;
        assert_eq!(invalidated["invalidated"], true);

        let (_, swept) = send(&app, Method::POST, "/admin/cache/sweep", None).await;
        assert_eq!(swept["deleted"], 0);

        let (status, cleared) = send(&app, Method::DELETE, "/admin/cache", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cleared["deleted"], 1);
    }
}
