//! In-process metrics registry backing the `metrics` facade.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use metrics_util::registry::{AtomicStorage, Registry};
use serde::Serialize;

use crate::error::{Error, Result};

/// Kind of a collected metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

/// Running summary of the values recorded into a histogram.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HistogramSummary {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl HistogramSummary {
    /// Fold `values` into the summary.
    pub fn absorb(&mut self, values: &[f64]) {
        for &value in values {
            if self.count == 0 {
                self.min = value;
                self.max = value;
            } else {
                self.min = self.min.min(value);
                self.max = self.max.max(value);
            }
            self.count += 1;
            self.sum += value;
        }
    }
}

/// Raw value read from the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSample {
    Counter(u64),
    Gauge(f64),
    /// Summary over every value recorded so far.
    Histogram(HistogramSummary),
}

impl RawSample {
    pub fn kind(&self) -> MetricKind {
        match self {
            RawSample::Counter(_) => MetricKind::Counter,
            RawSample::Gauge(_) => MetricKind::Gauge,
            RawSample::Histogram(_) => MetricKind::Histogram,
        }
    }
}

/// One metric series as collected from the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedMetric {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub sample: RawSample,
}

/// Metrics registry holding live counters, gauges and histograms.
///
/// Histogram buckets are drained on every [`collect`](Self::collect) and
/// folded into a per-series summary, so retained memory stays bounded by the
/// number of series. Cloning shares the underlying storage.
#[derive(Clone)]
pub struct MetricsRegistry {
    inner: Arc<Registry<Key, AtomicStorage>>,
    histogram_summaries: Arc<DashMap<Key, HistogramSummary>>,
    descriptions: Arc<DashMap<String, String>>,
}

impl MetricsRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Registry::atomic()),
            histogram_summaries: Arc::new(DashMap::new()),
            descriptions: Arc::new(DashMap::new()),
        }
    }

    /// Install this registry as the process-wide `metrics` recorder.
    pub fn install(&self) -> Result<()> {
        metrics::set_global_recorder(self.clone())
            .map_err(|err| Error::RecorderInstall(err.to_string()))
    }

    /// Description registered for `name`, if any.
    pub fn description(&self, name: &str) -> Option<String> {
        self.descriptions.get(name).map(|entry| entry.value().clone())
    }

    /// Read every series as it stands right now.
    pub fn collect(&self) -> Vec<CollectedMetric> {
        let mut collected = Vec::new();

        self.inner.visit_counters(|key, counter| {
            collected.push(collected_metric(
                key,
                RawSample::Counter(counter.load(Ordering::Acquire)),
            ));
        });
        self.inner.visit_gauges(|key, gauge| {
            collected.push(collected_metric(
                key,
                RawSample::Gauge(f64::from_bits(gauge.load(Ordering::Acquire))),
            ));
        });
        self.inner.visit_histograms(|key, histogram| {
            let mut summary = self.histogram_summaries.entry(key.clone()).or_default();
            histogram.clear_with(|values| summary.absorb(values));
            collected.push(collected_metric(key, RawSample::Histogram(*summary)));
        });

        collected
    }

    fn describe(&self, key: KeyName, description: SharedString) {
        self.descriptions
            .insert(key.as_str().to_string(), String::from(&*description));
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("histograms", &self.histogram_summaries.len())
            .field("descriptions", &self.descriptions.len())
            .finish()
    }
}

fn collected_metric(key: &Key, sample: RawSample) -> CollectedMetric {
    CollectedMetric {
        name: key.name().to_string(),
        labels: key
            .labels()
            .map(|label| (label.key().to_string(), label.value().to_string()))
            .collect(),
        sample,
    }
}

impl Recorder for MetricsRegistry {
    fn describe_counter(&self, key: KeyName, _unit: Option<Unit>, description: SharedString) {
        self.describe(key, description);
    }

    fn describe_gauge(&self, key: KeyName, _unit: Option<Unit>, description: SharedString) {
        self.describe(key, description);
    }

    fn describe_histogram(&self, key: KeyName, _unit: Option<Unit>, description: SharedString) {
        self.describe(key, description);
    }

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        self.inner
            .get_or_create_counter(key, |counter| Counter::from_arc(counter.clone()))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        self.inner
            .get_or_create_gauge(key, |gauge| Gauge::from_arc(gauge.clone()))
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        self.inner
            .get_or_create_histogram(key, |histogram| Histogram::from_arc(histogram.clone()))
    }
}
