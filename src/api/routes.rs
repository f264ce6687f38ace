//! HTTP API route definitions.

use axum::{
    routing::{any, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers::{healthz, metrics, pubsub_push, pubsub_push_missing_id, AppState};

/// Create the control-plane router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoint, any method
        .route("/healthz", any(healthz))
        // Push delivery; the bare path carries the empty subscription id
        .route("/pubsub/push/", post(pubsub_push_missing_id))
        .route("/pubsub/push/:subscription_id", post(pubsub_push))
        // JSON-based metrics
        .route("/metrics", get(metrics))
        // Failures are logged once where they are detected
        .layer(TraceLayer::new_for_http().on_failure(()))
        .with_state(state)
}
