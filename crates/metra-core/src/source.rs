use async_trait::async_trait;
use metra_model::{Labels, MetricsEvent};

use crate::error::CoreError;
use crate::registry::MetricsRegistry;

/// A single write issued against a [`MetricsSource`].
#[derive(Debug, Clone, Copy)]
pub enum Record<'a> {
    Increment {
        name: &'a str,
        delta: f64,
        labels: &'a Labels,
    },
    Set {
        name: &'a str,
        value: f64,
        labels: &'a Labels,
    },
    Observe {
        name: &'a str,
        buckets: &'a [f64],
        value: f64,
        labels: &'a Labels,
    },
}

/// What an exporter reads from and writes its own metrics into.
///
/// [`MetricsRegistry`] is the production implementation; the trait exists so exporters can be
/// exercised against sources that fail.
#[async_trait]
pub trait MetricsSource: Send + Sync + 'static {
    /// Snapshot of all series.
    async fn export(&self) -> Result<Vec<MetricsEvent>, CoreError>;

    /// Apply a single write.
    fn record(&self, record: Record<'_>) -> Result<(), CoreError>;
}

#[async_trait]
impl MetricsSource for MetricsRegistry {
    async fn export(&self) -> Result<Vec<MetricsEvent>, CoreError> {
        Ok(MetricsRegistry::export(self))
    }

    fn record(&self, record: Record<'_>) -> Result<(), CoreError> {
        match record {
            Record::Increment {
                name,
                delta,
                labels,
            } => self.counter(name)?.inc_by(delta, labels),
            Record::Set {
                name,
                value,
                labels,
            } => {
                self.gauge(name)?.set(value, labels);
                Ok(())
            }
            Record::Observe {
                name,
                buckets,
                value,
                labels,
            } => self.histogram(name, Some(buckets))?.observe(value, labels),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registry_applies_records() {
        let registry = MetricsRegistry::new();
        let source: &dyn MetricsSource = &registry;
        let labels = Labels::single("result", "success");

        source
            .record(Record::Increment {
                name: "refresh_total",
                delta: 1.0,
                labels: &labels,
            })
            .unwrap();
        source
            .record(Record::Set {
                name: "refresh_inflight",
                value: 1.0,
                labels: &Labels::new(),
            })
            .unwrap();
        source
            .record(Record::Observe {
                name: "refresh_duration_seconds",
                buckets: &[0.1, 1.0],
                value: 0.05,
                labels: &labels,
            })
            .unwrap();

        let events = source.export().await.unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(registry.counter("refresh_total").unwrap().value_for_labels(&labels), 1.0);
    }

    #[tokio::test]
    async fn record_surfaces_type_mismatch() {
        let registry = MetricsRegistry::new();
        registry.gauge("x").unwrap();

        let err = registry
            .record(Record::Increment {
                name: "x",
                delta: 1.0,
                labels: &Labels::new(),
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { .. }));
    }
}
