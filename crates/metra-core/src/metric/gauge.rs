use std::sync::{Arc, RwLock};

use metra_model::{Labels, MetricsEvent};

use crate::metric::{Series, read, write};

/// Last-write-wins scalar, optionally per label combination.
#[derive(Debug, Clone)]
pub struct Gauge {
    name: Arc<str>,
    series: Arc<RwLock<Series<f64>>>,
}

impl Gauge {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            series: Arc::new(RwLock::new(Series::default())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set(&self, value: f64, labels: &Labels) {
        let mut series = write(&self.series);
        *series.entry(labels, || 0.0) = value;
    }

    pub fn add(&self, delta: f64, labels: &Labels) {
        let mut series = write(&self.series);
        *series.entry(labels, || 0.0) += delta;
    }

    #[inline]
    pub fn inc(&self, labels: &Labels) {
        self.add(1.0, labels);
    }

    #[inline]
    pub fn dec(&self, labels: &Labels) {
        self.add(-1.0, labels);
    }

    pub fn value(&self) -> f64 {
        self.value_for_labels(&Labels::new())
    }

    pub fn value_for_labels(&self, labels: &Labels) -> f64 {
        read(&self.series).get(labels).copied().unwrap_or(0.0)
    }

    pub fn reset(&self) {
        write(&self.series).clear();
    }

    pub(crate) fn collect(&self, out: &mut Vec<MetricsEvent>) {
        read(&self.series).visit(
            || 0.0,
            |labels, v| out.push(MetricsEvent::gauge(&*self.name, *v, labels.clone())),
        );
    }
}
