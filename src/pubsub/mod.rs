//! Pub/sub push delivery routing.
//!
//! This module handles:
//! - The subscription id to delivery handler table
//! - Dispatching one inbound push to its handler

pub mod dispatcher;
pub mod registry;

pub use dispatcher::PushDispatcher;
pub use registry::{DeliveryHandler, PushRequest, SubscriptionRegistry};
