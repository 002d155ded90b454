use std::sync::Arc;

use amend_core::attributes::AttributeDictionary;
use amend_core::engine::ChangeEngine;
use amend_core::memory::{MemoryChangeStore, MemoryEntityStore};
use amend_core::value::{AttributeMap, AttributeValue};
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use amend_api::config::ServerConfig;
use amend_api::router::build_app_router;
use amend_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        entity_store_timeout_secs: 5,
        max_batch_size: 100,
    }
}

/// The full application router over in-memory stores, plus handles to
/// those stores for seeding and fault injection.
pub struct TestApp {
    pub router: Router,
    pub changes: Arc<MemoryChangeStore>,
    pub entities: Arc<MemoryEntityStore>,
}

/// Build the application with the same middleware stack production uses.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let changes = Arc::new(MemoryChangeStore::new());
    let entities = Arc::new(MemoryEntityStore::new());
    let engine = ChangeEngine::new(
        changes.clone(),
        changes.clone(),
        entities.clone(),
        Arc::new(AttributeDictionary::employee_defaults()),
        config.engine_config(),
    );

    let state = AppState {
        engine: Arc::new(engine),
        config: Arc::new(config.clone()),
    };

    TestApp {
        router: build_app_router(state, &config),
        changes,
        entities,
    }
}

impl TestApp {
    /// Seed employees e1 (Sales) and e2 (Marketing).
    pub async fn seed_departments(&self) {
        for (id, department) in [("e1", "Sales"), ("e2", "Marketing")] {
            let mut values = AttributeMap::new();
            values.insert(
                "department".to_string(),
                Some(AttributeValue::text(department)),
            );
            self.entities.insert(id, values).await;
        }
    }

    pub async fn department(&self, entity_id: &str) -> Option<AttributeValue> {
        self.entities
            .get(entity_id)
            .await
            .and_then(|e| e.get("department").cloned().flatten())
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST with no body (action endpoints such as cancel and revert).
pub async fn post(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
