//! In-memory metrics harness
//!
//! Wraps a `metrics_util` debugging recorder in a [`MeterRegistry`] and
//! turns its snapshots into owned, label-queryable values.
//!
//! Histograms are drained by every snapshot; take one snapshot per
//! assertion block.

use flow_metrics::registry::MeterRegistry;
use metrics::Unit;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use metrics_util::MetricKind;
use std::collections::BTreeMap;

/// Registry plus snapshotter over one debugging recorder.
pub struct MetricsHarness {
    registry: MeterRegistry,
    snapshotter: Snapshotter,
}

impl MetricsHarness {
    /// Create a harness with an empty recorder
    pub fn new() -> Self {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        Self {
            registry: MeterRegistry::from_recorder(recorder),
            snapshotter,
        }
    }

    /// Registry handle to pass to decorators
    pub fn registry(&self) -> MeterRegistry {
        self.registry.clone()
    }

    /// Capture everything recorded so far
    pub fn snapshot(&self) -> MetricSnapshot {
        let entries = self
            .snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .map(|(key, unit, description, value)| {
                let labels = key
                    .key()
                    .labels()
                    .map(|label| (label.key().to_string(), label.value().to_string()))
                    .collect();
                let value = match value {
                    DebugValue::Counter(v) => MetricValue::Counter(v),
                    DebugValue::Gauge(v) => MetricValue::Gauge(v.0),
                    DebugValue::Histogram(values) => {
                        MetricValue::Histogram(values.into_iter().map(|v| v.0).collect())
                    }
                };
                MetricEntry {
                    name: key.key().name().to_string(),
                    kind: key.kind(),
                    labels,
                    unit,
                    description: description.map(|d| d.to_string()),
                    value,
                }
            })
            .collect();
        MetricSnapshot { entries }
    }
}

impl Default for MetricsHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Value of one series at snapshot time.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Counter(u64),
    Gauge(f64),
    Histogram(Vec<f64>),
}

/// One recorded series.
#[derive(Debug, Clone)]
pub struct MetricEntry {
    pub name: String,
    pub kind: MetricKind,
    pub labels: BTreeMap<String, String>,
    pub unit: Option<Unit>,
    pub description: Option<String>,
    pub value: MetricValue,
}

impl MetricEntry {
    /// Whether every `(key, value)` pair is present on this series
    pub fn matches(&self, labels: &[(&str, &str)]) -> bool {
        labels
            .iter()
            .all(|(k, v)| self.labels.get(*k).map(String::as_str) == Some(*v))
    }
}

/// Owned snapshot of a [`MetricsHarness`].
#[derive(Debug, Clone, Default)]
pub struct MetricSnapshot {
    entries: Vec<MetricEntry>,
}

impl MetricSnapshot {
    /// All series
    pub fn entries(&self) -> &[MetricEntry] {
        &self.entries
    }

    /// Series named `name` carrying every label in `labels`
    pub fn series<'a>(
        &'a self,
        name: &'a str,
        labels: &'a [(&'a str, &'a str)],
    ) -> impl Iterator<Item = &'a MetricEntry> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.name == name && e.matches(labels))
    }

    /// Sum of counter series matching `name` and `labels` (0 if none)
    pub fn counter(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        self.series(name, labels)
            .map(|e| match e.value {
                MetricValue::Counter(v) => v,
                _ => 0,
            })
            .sum()
    }

    /// Samples of histogram series matching `name` and `labels`
    pub fn histogram(&self, name: &str, labels: &[(&str, &str)]) -> Vec<f64> {
        self.series(name, labels)
            .flat_map(|e| match &e.value {
                MetricValue::Histogram(values) => values.clone(),
                _ => Vec::new(),
            })
            .collect()
    }

    /// Number of samples in histogram series matching `name` and `labels`
    pub fn histogram_count(&self, name: &str, labels: &[(&str, &str)]) -> usize {
        self.histogram(name, labels).len()
    }

    /// Whether any series named `name` was registered
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Value of the first gauge series matching `name` and `labels`
    pub fn gauge(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        self.series(name, labels).find_map(|e| match e.value {
            MetricValue::Gauge(v) => Some(v),
            _ => None,
        })
    }

    /// Label values of `label` across all series named `name`
    pub fn label_values(&self, name: &str, label: &str) -> Vec<String> {
        let mut values: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.name == name)
            .filter_map(|e| e.labels.get(label).cloned())
            .collect();
        values.sort();
        values.dedup();
        values
    }
}
