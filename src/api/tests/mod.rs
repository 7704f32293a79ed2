use super::*;
use crate::engine::test_helpers::{TestEngine, create_test_engine, definition, seed_contacts};
use crate::types::{SendType, SourcePool};
use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::Response;
use std::time::Duration;
use tower::ServiceExt;

mod duplicates;
mod tasks;

/// Test engine plus a router over it
async fn test_app() -> (Router, TestEngine) {
    let t = create_test_engine().await;
    let engine = Arc::new(t.engine.clone());
    let config = engine.get_config();
    (create_router(engine, config), t)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_api_server_spawns() {
    let t = create_test_engine().await;

    // Port 0 = OS assigns a free port
    let mut config = (*t.engine.get_config()).clone();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();

    let api_handle = tokio::spawn({
        let engine = Arc::new(t.engine.clone());
        async move { start_api_server(engine, Arc::new(config)).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!api_handle.is_finished());
    api_handle.abort();
}

#[tokio::test]
async fn test_cors_enabled() {
    let t = create_test_engine().await;
    let mut config = (*t.engine.get_config()).clone();
    config.server.api.cors_enabled = true;
    config.server.api.cors_origins = vec!["*".to_string()];
    let app = create_router(Arc::new(t.engine.clone()), Arc::new(config));

    let request = Request::builder()
        .uri("/api/v1/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let t = create_test_engine().await;
    let mut config = (*t.engine.get_config()).clone();
    config.server.api.cors_enabled = false;
    let app = create_router(Arc::new(t.engine.clone()), Arc::new(config));

    let request = Request::builder()
        .uri("/api/v1/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}
