//! Control-plane server: owns the subscription registry and binds the routes.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::api::{create_router, AppState};
use crate::config::Config;
use crate::error::Result;
use crate::health::HealthReporter;
use crate::metrics::{MetricsExporter, MetricsRegistry};
use crate::pubsub::{DeliveryHandler, PushDispatcher, SubscriptionRegistry};

/// Composes dispatcher, health reporter and metrics exporter behind the
/// three control-plane routes.
#[derive(Debug, Clone)]
pub struct ControlPlaneServer {
    registry: SubscriptionRegistry,
    state: AppState,
}

impl ControlPlaneServer {
    pub fn new(config: &Config, metrics: MetricsRegistry) -> Self {
        let registry = SubscriptionRegistry::new();
        let state = AppState::new(
            PushDispatcher::new(registry.clone()),
            HealthReporter::new(&config.build_metadata()),
            MetricsExporter::new(config, metrics),
        );

        if !state.metrics.enabled() {
            info!("JSON-based metrics disabled; /metrics will return 404");
        }

        Self { registry, state }
    }

    /// Register the delivery handler for a subscription.
    ///
    /// Called by the messaging subsystem once per declared subscription. May
    /// be called before or while serving; a repeated id replaces the earlier
    /// handler.
    pub fn register_delivery_handler(
        &self,
        subscription_id: impl Into<String>,
        handler: Arc<dyn DeliveryHandler>,
    ) {
        self.registry.register(subscription_id, handler);
    }

    /// Number of registered subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.registry.len()
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Serve on `listener` until `shutdown` resolves.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(addr = ?listener.local_addr().ok(), "control plane listening");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("control plane stopped");
        Ok(())
    }
}
