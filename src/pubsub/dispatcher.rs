//! Routes a single push request to its registered delivery handler.

use std::time::Instant;

use tracing::{error, instrument, warn};

use super::registry::{PushRequest, SubscriptionRegistry};
use crate::error::ApiError;
use crate::metrics::{
    inc_push_rejected, inc_push_requests, record_push_handler_latency, OUTCOME_HANDLER_ERROR,
    OUTCOME_MISSING_ID, OUTCOME_OK, OUTCOME_UNKNOWN_SUBSCRIPTION,
};

/// Dispatches push deliveries using a shared [`SubscriptionRegistry`].
#[derive(Debug, Clone)]
pub struct PushDispatcher {
    registry: SubscriptionRegistry,
}

impl PushDispatcher {
    pub fn new(registry: SubscriptionRegistry) -> Self {
        Self { registry }
    }

    /// Route `request` to the handler registered for its subscription id.
    ///
    /// The handler is invoked at most once and runs on its own task, so a
    /// panic inside it surfaces as an `Internal` error. No timeout is applied
    /// and dropping the returned future does not cancel the handler.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` when the subscription id is empty.
    /// - `NotFound` when no handler is registered for it.
    /// - Whatever the handler returns.
    #[instrument(skip(self, request), fields(subscription_id = %request.subscription_id))]
    pub async fn dispatch(&self, request: PushRequest) -> Result<(), ApiError> {
        let subscription_id = request.subscription_id.clone();

        if subscription_id.is_empty() {
            let err = ApiError::invalid_argument("missing subscription ID");
            warn!(subscription_id = %subscription_id, error = %err, "invalid pubsub push request");
            inc_push_rejected(OUTCOME_MISSING_ID);
            return Err(err);
        }

        let Some(handler) = self.registry.lookup(&subscription_id) else {
            let err = ApiError::not_found("unknown pubsub subscription");
            warn!(subscription_id = %subscription_id, error = %err, "invalid pubsub push request");
            inc_push_rejected(OUTCOME_UNKNOWN_SUBSCRIPTION);
            return Err(err);
        };

        let start = Instant::now();
        let outcome = match tokio::spawn(async move { handler.handle(request).await }).await {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => {
                Err(ApiError::internal("delivery handler panicked"))
            }
            Err(_) => Err(ApiError::internal("delivery handler was cancelled")),
        };
        record_push_handler_latency(start, &subscription_id);

        match &outcome {
            Ok(()) => inc_push_requests(&subscription_id, OUTCOME_OK),
            Err(err) => {
                error!(subscription_id = %subscription_id, error = %err, "error while handling pubsub push request");
                inc_push_requests(&subscription_id, OUTCOME_HANDLER_ERROR);
            }
        }

        outcome
    }
}
