//! HTTP API handlers.

use axum::body::Bytes;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use tracing::warn;

use crate::error::{json_response, translate, ApiError};
use crate::health::HealthReporter;
use crate::metrics::{inc_metrics_exports, inc_push_rejected, MetricsExporter, OUTCOME_INVALID_ID};
use crate::pubsub::{PushDispatcher, PushRequest};

/// Application state shared with handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Push delivery router.
    pub dispatcher: PushDispatcher,
    /// Liveness document producer.
    pub health: HealthReporter,
    /// Gated metrics snapshot producer.
    pub metrics: MetricsExporter,
}

impl AppState {
    /// Create new app state.
    pub fn new(dispatcher: PushDispatcher, health: HealthReporter, metrics: MetricsExporter) -> Self {
        Self {
            dispatcher,
            health,
            metrics,
        }
    }
}

fn with_nosniff(mut response: Response) -> Response {
    response.headers_mut().insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response
}

/// Health check handler - always returns 200, for any method.
pub async fn healthz(State(state): State<AppState>) -> Response {
    with_nosniff(json_response(StatusCode::OK, &state.health.report()))
}

/// Push handler - routes the delivery to the subscription's handler.
///
/// A path segment that does not decode to UTF-8 is rejected as
/// `InvalidArgument` without reaching the dispatcher.
pub async fn pubsub_push(
    State(state): State<AppState>,
    subscription_id: Result<Path<String>, PathRejection>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let subscription_id = match subscription_id {
        Ok(Path(id)) => id,
        Err(rejection) => {
            let err = ApiError::invalid_argument(format!(
                "invalid subscription ID: {}",
                rejection.body_text()
            ));
            warn!(path = %uri.path(), error = %err, "invalid pubsub push request");
            inc_push_rejected(OUTCOME_INVALID_ID);
            return translate(Err(err));
        }
    };

    deliver(state, subscription_id, method, uri, headers, body).await
}

/// Push handler for the bare route, which carries the empty subscription id.
pub async fn pubsub_push_missing_id(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    deliver(state, String::new(), method, uri, headers, body).await
}

async fn deliver(
    state: AppState,
    subscription_id: String,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = PushRequest {
        subscription_id,
        method,
        uri,
        headers,
        body,
    };

    translate(state.dispatcher.dispatch(request).await)
}

/// Metrics handler - returns the JSON snapshot, or 404 when disabled.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.snapshot() {
        Ok(data) => {
            inc_metrics_exports();
            with_nosniff(json_response(StatusCode::OK, &data))
        }
        Err(err) => err.into_response(),
    }
}
