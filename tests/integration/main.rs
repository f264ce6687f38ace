//! End-to-end scenarios against the control-plane router.
//!
//! Run with: cargo test --test integration

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use metrics::counter;
use pretty_assertions::assert_eq;
use tower::ServiceExt;

use control_plane::config::{Config, JsonBasedMetricsConfig, MetricsConfig, RuntimeConfig};
use control_plane::metrics::MetricsRegistry;
use control_plane::{ApiError, ControlPlaneServer, PushRequest};

fn metrics_enabled_config() -> Config {
    Config {
        runtime_config: Some(RuntimeConfig {
            metrics: Some(MetricsConfig {
                json_based: Some(JsonBasedMetricsConfig::default()),
            }),
        }),
        ..Config::default()
    }
}

async fn send(app: Router, method: Method, uri: &str, body: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Scenario A: a successful handler yields 200 with no error body.
#[tokio::test]
async fn push_to_successful_handler() {
    let server = ControlPlaneServer::new(&Config::default(), MetricsRegistry::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    server.register_delivery_handler(
        "sub-1",
        Arc::new(move |request: PushRequest| {
            let seen = seen.clone();
            async move {
                assert_eq!(request.subscription_id, "sub-1");
                assert_eq!(&request.body[..], br#"{"message":{"data":"e30="}}"#);
                seen.fetch_add(1, Ordering::SeqCst);
                Ok::<(), ApiError>(())
            }
        }),
    );

    let response = send(
        server.router(),
        Method::POST,
        "/pubsub/push/sub-1",
        r#"{"message":{"data":"e30="}}"#,
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_bytes(response).await.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Scenario B: a failing handler's error is translated to the wire.
#[tokio::test]
async fn push_to_failing_handler() {
    let server = ControlPlaneServer::new(&Config::default(), MetricsRegistry::new());
    server.register_delivery_handler(
        "sub-2",
        Arc::new(|_request: PushRequest| async {
            Err::<(), ApiError>(ApiError::internal("boom"))
        }),
    );

    let response = send(server.router(), Method::POST, "/pubsub/push/sub-2", "{}").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"code": "internal", "message": "boom", "details": null})
    );
}

/// Scenario C: an unregistered subscription is 404.
#[tokio::test]
async fn push_to_unknown_subscription() {
    let server = ControlPlaneServer::new(&Config::default(), MetricsRegistry::new());

    let response = send(server.router(), Method::POST, "/pubsub/push/sub-3", "{}").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({
            "code": "not_found",
            "message": "unknown pubsub subscription",
            "details": null,
        })
    );
}

/// Scenario D (disabled): no JSON-based metrics config means 404.
#[tokio::test]
async fn metrics_disabled_without_config() {
    let server = ControlPlaneServer::new(&Config::default(), MetricsRegistry::new());

    let response = send(server.router(), Method::GET, "/metrics", "").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "not_found");
}

/// Scenario D (enabled): the snapshot reflects current samples on every call.
#[tokio::test]
async fn metrics_enabled_reflects_current_samples() {
    let registry = MetricsRegistry::new();
    let server = ControlPlaneServer::new(&metrics_enabled_config(), registry.clone());
    let deliveries = metrics::with_local_recorder(&registry, || {
        counter!("deliveries_total", "subscription_id" => "sub-1")
    });

    deliveries.increment(4);
    let response = send(server.router(), Method::GET, "/metrics", "").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(
        body_json(response).await,
        serde_json::json!([{
            "name": "deliveries_total",
            "type": "counter",
            "labels": {"subscription_id": "sub-1"},
            "value": 4,
        }])
    );

    deliveries.increment(1);
    let response = send(server.router(), Method::GET, "/metrics", "").await;
    assert_eq!(body_json(response).await[0]["value"], 5);
}

/// Health is independent of configuration state.
#[tokio::test]
async fn healthz_regardless_of_config() {
    for config in [Config::default(), metrics_enabled_config()] {
        let server = ControlPlaneServer::new(&config, MetricsRegistry::new());
        let response = send(server.router(), Method::HEAD, "/healthz", "").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
    }
}

/// Handlers registered after the router is built are still reachable.
#[tokio::test]
async fn registration_after_router_construction() {
    let server = ControlPlaneServer::new(&Config::default(), MetricsRegistry::new());
    let router = server.router();

    server.register_delivery_handler(
        "late",
        Arc::new(|_request: PushRequest| async { Ok::<(), ApiError>(()) }),
    );

    let response = send(router, Method::POST, "/pubsub/push/late", "{}").await;
    assert_eq!(response.status(), StatusCode::OK);
}
