//! Subscription id to delivery handler table.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, Method, Uri};
use dashmap::DashMap;
use tracing::{info, warn};

use crate::error::ApiError;

/// Inbound push delivery, forwarded to the handler as received.
#[derive(Debug, Clone)]
pub struct PushRequest {
    /// Subscription the push was addressed to.
    pub subscription_id: String,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl PushRequest {
    /// Build a request with just a subscription id and body.
    pub fn new(subscription_id: impl Into<String>, body: impl Into<Bytes>) -> Self {
        let subscription_id = subscription_id.into();
        let uri = format!("/pubsub/push/{subscription_id}")
            .parse()
            .unwrap_or_default();
        Self {
            subscription_id,
            method: Method::POST,
            uri,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }
}

/// Processes push deliveries for one subscription.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    /// Handle one delivery.
    ///
    /// # Errors
    ///
    /// Returns the failure to report back to the push source.
    async fn handle(&self, request: PushRequest) -> Result<(), ApiError>;
}

#[async_trait]
impl<F, Fut> DeliveryHandler for F
where
    F: Fn(PushRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ApiError>> + Send + 'static,
{
    async fn handle(&self, request: PushRequest) -> Result<(), ApiError> {
        (self)(request).await
    }
}

/// Concurrent map of subscription id to handler.
///
/// Registration may race with dispatch; re-registering an id replaces the
/// previous handler.
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    handlers: Arc<DashMap<String, Arc<dyn DeliveryHandler>>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `handler` under `subscription_id`, replacing any previous entry.
    pub fn register(&self, subscription_id: impl Into<String>, handler: Arc<dyn DeliveryHandler>) {
        let subscription_id = subscription_id.into();
        if self
            .handlers
            .insert(subscription_id.clone(), handler)
            .is_some()
        {
            warn!(subscription_id = %subscription_id, "replaced existing delivery handler");
        } else {
            info!(subscription_id = %subscription_id, "registered delivery handler");
        }
    }

    /// Handler registered under `subscription_id`, if any.
    pub fn lookup(&self, subscription_id: &str) -> Option<Arc<dyn DeliveryHandler>> {
        self.handlers
            .get(subscription_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, subscription_id: &str) -> bool {
        self.handlers.contains_key(subscription_id)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("subscriptions", &self.handlers.len())
            .finish()
    }
}
