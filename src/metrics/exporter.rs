//! JSON-based metrics export and the feature gate in front of it.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use super::registry::{CollectedMetric, HistogramSummary, MetricKind, MetricsRegistry, RawSample};
use crate::config::{Config, JsonBasedMetricsConfig};
use crate::error::{ApiError, ErrCode};

/// True when runtime config, its metrics section and the JSON-based
/// subsection are all present.
pub fn export_enabled(config: &Config) -> bool {
    config.json_based_metrics().is_some()
}

/// One exported metric series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricData {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MetricKind,
    pub labels: BTreeMap<String, String>,
    pub value: MetricValue,
}

/// Exported value of a series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Counter(u64),
    Gauge(f64),
    Histogram(HistogramSummary),
}

/// Renders collected samples into the exported document shape.
#[derive(Debug, Clone)]
pub struct JsonMetricsExporter {
    label_keys: Vec<String>,
    config: JsonBasedMetricsConfig,
}

impl JsonMetricsExporter {
    /// `label_keys` restricts sample labels to those keys; empty keeps all.
    pub fn new(label_keys: Vec<String>, config: JsonBasedMetricsConfig) -> Self {
        Self { label_keys, config }
    }

    /// Transform raw samples, sorted by name and then labels.
    pub fn get_metric_data(&self, collected: Vec<CollectedMetric>) -> Vec<MetricData> {
        let mut data: Vec<MetricData> = collected
            .into_iter()
            .map(|metric| {
                let value = match &metric.sample {
                    RawSample::Counter(v) => MetricValue::Counter(*v),
                    RawSample::Gauge(v) => MetricValue::Gauge(*v),
                    RawSample::Histogram(summary) => MetricValue::Histogram(*summary),
                };
                MetricData {
                    kind: metric.sample.kind(),
                    labels: self.labels_for(metric.labels),
                    name: metric.name,
                    value,
                }
            })
            .collect();

        data.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.labels.cmp(&b.labels)));
        data
    }

    fn labels_for(&self, own: BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut labels = self.config.static_labels.clone();
        for (key, value) in own {
            if self.label_keys.is_empty() || self.label_keys.contains(&key) {
                labels.insert(key, value);
            }
        }
        labels
    }
}

/// Gated producer of metrics snapshots.
///
/// The gate is decided once at construction.
#[derive(Debug, Clone)]
pub struct MetricsExporter {
    registry: MetricsRegistry,
    json_based: Option<JsonBasedMetricsConfig>,
}

impl MetricsExporter {
    pub fn new(config: &Config, registry: MetricsRegistry) -> Self {
        Self::from_parts(config.json_based_metrics().cloned(), registry)
    }

    pub fn from_parts(json_based: Option<JsonBasedMetricsConfig>, registry: MetricsRegistry) -> Self {
        Self {
            registry,
            json_based,
        }
    }

    pub fn enabled(&self) -> bool {
        self.json_based.is_some()
    }

    pub fn registry(&self) -> &MetricsRegistry {
        &self.registry
    }

    /// Collect and export the registry's current samples.
    ///
    /// # Errors
    ///
    /// `NotFound` when JSON-based metrics are not enabled.
    pub fn snapshot(&self) -> Result<Vec<MetricData>, ApiError> {
        let Some(config) = &self.json_based else {
            let err = ApiError::bare(ErrCode::NotFound);
            warn!(error = %err, "JSON-based metrics are not enabled for this environment");
            return Err(err);
        };

        let exporter = JsonMetricsExporter::new(Vec::new(), config.clone());
        let data = exporter.get_metric_data(self.registry.collect());
        debug!(series = data.len(), "exported metrics snapshot");
        Ok(data)
    }
}
