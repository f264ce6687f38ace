//! Internal control-plane HTTP surface for a backend service runtime.
//!
//! Three routes are served:
//!
//! ```text
//! ANY  /healthz                          liveness + deploy identity
//! POST /pubsub/push/:subscription_id     push delivery to a registered handler
//! GET  /metrics                          JSON metrics snapshot (feature-gated)
//! ```
//!
//! The messaging subsystem registers one delivery handler per subscription
//! through [`ControlPlaneServer::register_delivery_handler`].
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Structured errors and their HTTP translation
//! - [`pubsub`]: Subscription registry and push dispatch
//! - [`health`]: Health reporting
//! - [`metrics`]: Metrics registry and JSON-based exporter
//! - [`api`]: HTTP handlers and routes
//! - [`server`]: Composition and serving
//! - [`utils`]: Utility functions

pub mod api;
pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod pubsub;
pub mod server;
pub mod utils;

pub use config::Config;
pub use error::{ApiError, ErrCode, Error, Result};
pub use pubsub::{DeliveryHandler, PushRequest};
pub use server::ControlPlaneServer;
