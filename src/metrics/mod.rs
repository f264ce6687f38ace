//! Metrics for the control plane and the registry they are collected into.
//!
//! Instrumentation goes through the `metrics` facade. Once a
//! [`MetricsRegistry`] is installed as the global recorder every sample lands
//! there, and the JSON-based exporter reads it back for `/metrics`.

pub mod exporter;
pub mod registry;

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use tracing::debug;

pub use exporter::{export_enabled, JsonMetricsExporter, MetricData, MetricValue, MetricsExporter};
pub use registry::{CollectedMetric, HistogramSummary, MetricKind, MetricsRegistry, RawSample};

// === Metric Name Constants ===

/// Push requests counter metric name.
pub const METRIC_PUSH_REQUESTS: &str = "pubsub_push_requests_total";
/// Delivery handler latency metric name.
pub const METRIC_PUSH_HANDLER_LATENCY: &str = "pubsub_push_handler_latency_ms";
/// Metrics export requests counter metric name.
pub const METRIC_METRICS_EXPORTS: &str = "metrics_exports_total";

/// Outcome label for a push that reached its handler and succeeded.
pub const OUTCOME_OK: &str = "ok";
/// Outcome label for a push with no subscription id.
pub const OUTCOME_MISSING_ID: &str = "missing_id";
/// Outcome label for a push whose subscription id could not be decoded.
pub const OUTCOME_INVALID_ID: &str = "invalid_id";
/// Outcome label for a push to an unregistered subscription.
pub const OUTCOME_UNKNOWN_SUBSCRIPTION: &str = "unknown_subscription";
/// Outcome label for a push whose handler failed.
pub const OUTCOME_HANDLER_ERROR: &str = "handler_error";

/// Initialize all metric descriptions.
/// Call this once at startup, after the recorder is installed.
pub fn init_metrics() {
    describe_counter!(
        METRIC_PUSH_REQUESTS,
        "Total number of pub/sub push requests by outcome"
    );
    describe_histogram!(
        METRIC_PUSH_HANDLER_LATENCY,
        "Delivery handler latency in milliseconds"
    );
    describe_counter!(
        METRIC_METRICS_EXPORTS,
        "Total number of JSON metrics snapshots served"
    );

    debug!("Metrics initialized");
}

/// Increment the push request counter for a push that named a registered
/// subscription.
pub fn inc_push_requests(subscription_id: &str, outcome: &'static str) {
    counter!(
        METRIC_PUSH_REQUESTS,
        "subscription_id" => subscription_id.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Increment the push request counter for a push rejected before lookup
/// succeeded.
///
/// The caller-supplied id is not a label: only registered ids may become
/// series, so arbitrary request paths cannot grow the registry.
pub fn inc_push_rejected(outcome: &'static str) {
    counter!(METRIC_PUSH_REQUESTS, "outcome" => outcome).increment(1);
}

/// Record delivery handler latency.
pub fn record_push_handler_latency(start: Instant, subscription_id: &str) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(
        METRIC_PUSH_HANDLER_LATENCY,
        "subscription_id" => subscription_id.to_string()
    )
    .record(latency_ms);
}

/// Increment the metrics export counter.
pub fn inc_metrics_exports() {
    counter!(METRIC_METRICS_EXPORTS).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn push_counters_land_in_local_recorder() {
        let registry = MetricsRegistry::new();

        metrics::with_local_recorder(&registry, || {
            inc_push_requests("sub-1", OUTCOME_OK);
            inc_push_requests("sub-1", OUTCOME_OK);
            inc_push_requests("sub-1", OUTCOME_HANDLER_ERROR);
        });

        let ok = registry
            .collect()
            .into_iter()
            .find(|m| {
                m.name == METRIC_PUSH_REQUESTS
                    && m.labels.get("outcome").map(String::as_str) == Some(OUTCOME_OK)
            })
            .unwrap();
        assert_eq!(ok.sample, RawSample::Counter(2));
        assert_eq!(ok.labels["subscription_id"], "sub-1");
    }

    #[test]
    fn handler_latency_is_recorded() {
        let registry = MetricsRegistry::new();
        let start = Instant::now();
        sleep(Duration::from_millis(5));

        metrics::with_local_recorder(&registry, || {
            record_push_handler_latency(start, "sub-1");
        });

        let latency = registry
            .collect()
            .into_iter()
            .find(|m| m.name == METRIC_PUSH_HANDLER_LATENCY)
            .unwrap();
        match latency.sample {
            RawSample::Histogram(summary) => {
                assert_eq!(summary.count, 1);
                assert!(summary.min >= 4.0);
            }
            other => panic!("expected histogram, got {other:?}"),
        }
    }

    #[test]
    fn rejected_pushes_share_one_series() {
        let registry = MetricsRegistry::new();

        metrics::with_local_recorder(&registry, || {
            inc_push_rejected(OUTCOME_UNKNOWN_SUBSCRIPTION);
            inc_push_rejected(OUTCOME_UNKNOWN_SUBSCRIPTION);
        });

        let collected = registry.collect();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].sample, RawSample::Counter(2));
        assert!(!collected[0].labels.contains_key("subscription_id"));
    }

    #[test]
    fn descriptions_are_kept() {
        let registry = MetricsRegistry::new();
        metrics::with_local_recorder(&registry, init_metrics);
        assert!(registry.description(METRIC_PUSH_REQUESTS).is_some());
    }
}
