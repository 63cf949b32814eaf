use serde::{Deserialize, Serialize};

use crate::{HistogramSummary, Labels};

/// Kind of collector a metric maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of a single exported data point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum MetricValue {
    Counter(f64),
    Gauge(f64),
    Histogram(HistogramSummary),
}

impl MetricValue {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Counter(_) => MetricKind::Counter,
            MetricValue::Gauge(_) => MetricKind::Gauge,
            MetricValue::Histogram(_) => MetricKind::Histogram,
        }
    }

    /// Scalar value for counters and gauges.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            MetricValue::Counter(v) | MetricValue::Gauge(v) => Some(*v),
            MetricValue::Histogram(_) => None,
        }
    }

    pub fn as_histogram(&self) -> Option<&HistogramSummary> {
        match self {
            MetricValue::Histogram(h) => Some(h),
            _ => None,
        }
    }
}

/// One exported data point: a metric name, its value and the label combination it belongs to.
///
/// A registry snapshot holds exactly one event per (metric, label combination).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsEvent {
    pub name: String,
    pub value: MetricValue,
    pub tags: Labels,
}

impl MetricsEvent {
    pub fn new(name: impl Into<String>, value: MetricValue, tags: Labels) -> Self {
        Self {
            name: name.into(),
            value,
            tags,
        }
    }

    pub fn counter(name: impl Into<String>, value: f64, tags: Labels) -> Self {
        Self::new(name, MetricValue::Counter(value), tags)
    }

    pub fn gauge(name: impl Into<String>, value: f64, tags: Labels) -> Self {
        Self::new(name, MetricValue::Gauge(value), tags)
    }

    pub fn histogram(name: impl Into<String>, summary: HistogramSummary, tags: Labels) -> Self {
        Self::new(name, MetricValue::Histogram(summary), tags)
    }

    #[inline]
    pub fn kind(&self) -> MetricKind {
        self.value.kind()
    }
}
