use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use metra_model::{DEFAULT_BUCKETS, MetricKind, MetricsEvent};
use tracing::{debug, trace};

use crate::error::CoreError;
use crate::metric::{Counter, Gauge, Histogram, read, write};
use crate::taxonomy::Taxonomy;

#[derive(Debug, Clone)]
enum Metric {
    Counter(Counter),
    Gauge(Gauge),
    Histogram(Histogram),
}

impl Metric {
    fn kind(&self) -> MetricKind {
        match self {
            Metric::Counter(_) => MetricKind::Counter,
            Metric::Gauge(_) => MetricKind::Gauge,
            Metric::Histogram(_) => MetricKind::Histogram,
        }
    }

    fn collect(&self, out: &mut Vec<MetricsEvent>) {
        match self {
            Metric::Counter(c) => c.collect(out),
            Metric::Gauge(g) => g.collect(out),
            Metric::Histogram(h) => h.collect(out),
        }
    }
}

/// In-process metrics registry.
///
/// Metrics are created on first access and reused afterwards: asking twice for the same name and
/// type returns handles over the same state. The registry is cheap to clone and meant to be
/// passed explicitly to whatever exports it.
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    metrics: Arc<RwLock<BTreeMap<String, Metric>>>,
    taxonomy: Option<Arc<dyn Taxonomy>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose histograms take default buckets from `taxonomy`.
    pub fn with_taxonomy(taxonomy: Arc<dyn Taxonomy>) -> Self {
        Self {
            metrics: Arc::default(),
            taxonomy: Some(taxonomy),
        }
    }

    pub fn taxonomy(&self) -> Option<&Arc<dyn Taxonomy>> {
        self.taxonomy.as_ref()
    }

    /// Return or create the counter `name`.
    pub fn counter(&self, name: &str) -> Result<Counter, CoreError> {
        match self.get_or_insert(name, MetricKind::Counter, || {
            Ok(Metric::Counter(Counter::new(name)))
        })? {
            Metric::Counter(c) => Ok(c),
            other => Err(mismatch(name, other.kind(), MetricKind::Counter)),
        }
    }

    /// Return or create the gauge `name`.
    pub fn gauge(&self, name: &str) -> Result<Gauge, CoreError> {
        match self.get_or_insert(name, MetricKind::Gauge, || Ok(Metric::Gauge(Gauge::new(name))))? {
            Metric::Gauge(g) => Ok(g),
            other => Err(mismatch(name, other.kind(), MetricKind::Gauge)),
        }
    }

    /// Return or create the histogram `name`.
    ///
    /// Buckets only matter on creation. Without explicit buckets the taxonomy is consulted, then
    /// the Prometheus defaults apply.
    pub fn histogram(&self, name: &str, buckets: Option<&[f64]>) -> Result<Histogram, CoreError> {
        let metric = self.get_or_insert(name, MetricKind::Histogram, || {
            let bounds = match buckets {
                Some(b) => b.to_vec(),
                None => self
                    .taxonomy
                    .as_ref()
                    .and_then(|t| t.buckets(name))
                    .unwrap_or_else(|| DEFAULT_BUCKETS.to_vec()),
            };
            Histogram::new(name, &bounds).map(Metric::Histogram)
        })?;

        match metric {
            Metric::Histogram(h) => {
                if let Some(b) = buckets
                    && b != h.buckets()
                {
                    debug!(metric = name, "histogram exists; requested buckets ignored");
                }
                Ok(h)
            }
            other => Err(mismatch(name, other.kind(), MetricKind::Histogram)),
        }
    }

    /// Snapshot of every series, sorted by metric name then label set.
    ///
    /// Each metric is read under its own lock, so no metric appears half-updated.
    pub fn export(&self) -> Vec<MetricsEvent> {
        let metrics = read(&self.metrics);
        let mut out = Vec::with_capacity(metrics.len());
        for metric in metrics.values() {
            metric.collect(&mut out);
        }
        trace!(events = out.len(), "registry exported");
        out
    }

    pub fn len(&self) -> usize {
        read(&self.metrics).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.metrics).is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        read(&self.metrics).keys().cloned().collect()
    }

    fn get_or_insert(
        &self,
        name: &str,
        kind: MetricKind,
        create: impl FnOnce() -> Result<Metric, CoreError>,
    ) -> Result<Metric, CoreError> {
        if let Some(existing) = read(&self.metrics).get(name) {
            return Ok(existing.clone());
        }

        let mut metrics = write(&self.metrics);
        // Another writer may have won the race between the two locks.
        if let Some(existing) = metrics.get(name) {
            return Ok(existing.clone());
        }
        let metric = create()?;
        trace!(metric = name, kind = %kind, "metric created");
        metrics.insert(name.to_string(), metric.clone());
        Ok(metric)
    }
}

fn mismatch(name: &str, existing: MetricKind, requested: MetricKind) -> CoreError {
    CoreError::TypeMismatch {
        name: name.to_string(),
        existing,
        requested,
    }
}
