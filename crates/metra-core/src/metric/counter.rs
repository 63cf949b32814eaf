use std::sync::{Arc, RwLock};

use metra_model::{Labels, MetricsEvent};

use crate::error::CoreError;
use crate::metric::{Series, read, write};

/// Monotonic accumulator, optionally dimensioned by labels.
///
/// The unlabeled value and every labeled value are independent accumulators.
#[derive(Debug, Clone)]
pub struct Counter {
    name: Arc<str>,
    series: Arc<RwLock<Series<f64>>>,
}

impl Counter {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            series: Arc::new(RwLock::new(Series::default())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Increment the unlabeled value by one.
    pub fn inc(&self) {
        let mut series = write(&self.series);
        *series.entry(&Labels::new(), || 0.0) += 1.0;
    }

    /// Increment the series addressed by `labels` by `delta`.
    ///
    /// `delta` must be finite and non-negative.
    pub fn inc_by(&self, delta: f64, labels: &Labels) -> Result<(), CoreError> {
        if !delta.is_finite() || delta < 0.0 {
            return Err(CoreError::InvalidIncrement {
                name: self.name.to_string(),
                delta,
            });
        }
        let mut series = write(&self.series);
        *series.entry(labels, || 0.0) += delta;
        Ok(())
    }

    /// Unlabeled value.
    pub fn value(&self) -> f64 {
        self.value_for_labels(&Labels::new())
    }

    /// Value accumulated under exactly this label set (zero if never touched).
    pub fn value_for_labels(&self, labels: &Labels) -> f64 {
        read(&self.series).get(labels).copied().unwrap_or(0.0)
    }

    /// Drop unlabeled and labeled state.
    pub fn reset(&self) {
        write(&self.series).clear();
    }

    pub(crate) fn collect(&self, out: &mut Vec<MetricsEvent>) {
        read(&self.series).visit(
            || 0.0,
            |labels, v| out.push(MetricsEvent::counter(&*self.name, *v, labels.clone())),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeled_and_unlabeled_do_not_interfere() {
        let c = Counter::new("requests_total");
        let ok = Labels::single("status", "200");
        let err = Labels::single("status", "500");

        c.inc();
        c.inc_by(2.0, &ok).unwrap();
        c.inc_by(3.0, &ok).unwrap();
        c.inc_by(1.0, &err).unwrap();

        assert_eq!(c.value(), 1.0);
        assert_eq!(c.value_for_labels(&ok), 5.0);
        assert_eq!(c.value_for_labels(&err), 1.0);
    }

    #[test]
    fn label_order_does_not_matter() {
        let c = Counter::new("c");
        c.inc_by(1.0, &Labels::from([("a", "1"), ("b", "2")]))
            .unwrap();
        c.inc_by(1.0, &Labels::from([("b", "2"), ("a", "1")]))
            .unwrap();

        assert_eq!(c.value_for_labels(&Labels::from([("a", "1"), ("b", "2")])), 2.0);
    }

    #[test]
    fn separator_characters_in_values_do_not_collide() {
        let c = Counter::new("c");
        let one = Labels::single("a", "1,b=2");
        let two = Labels::from([("a", "1"), ("b", "2")]);

        c.inc_by(1.0, &one).unwrap();
        c.inc_by(5.0, &two).unwrap();

        assert_eq!(c.value_for_labels(&one), 1.0);
        assert_eq!(c.value_for_labels(&two), 5.0);

        let mut out = Vec::new();
        c.collect(&mut out);
        assert_eq!(out.len(), 2);
        assert!(out.iter().any(|e| e.tags == one));
        assert!(out.iter().any(|e| e.tags == two));
    }

    #[test]
    fn sum_of_deltas_per_label_set() {
        let c = Counter::new("c");
        let sets = [
            Labels::new(),
            Labels::single("k", "x"),
            Labels::single("k", "y"),
            Labels::from([("k", "x"), ("j", "z")]),
        ];
        let mut expected = [0.0; 4];

        for step in 0..40u32 {
            let idx = (step * 7 % 4) as usize;
            let delta = f64::from(step % 5) * 0.5;
            c.inc_by(delta, &sets[idx]).unwrap();
            expected[idx] += delta;
        }

        for (labels, want) in sets.iter().zip(expected) {
            assert_eq!(c.value_for_labels(labels), want);
        }
    }

    #[test]
    fn rejects_negative_and_nan() {
        let c = Counter::new("c");
        assert!(matches!(
            c.inc_by(-1.0, &Labels::new()),
            Err(CoreError::InvalidIncrement { .. })
        ));
        assert!(c.inc_by(f64::NAN, &Labels::new()).is_err());
        assert_eq!(c.value(), 0.0);
    }

    #[test]
    fn reset_clears_everything() {
        let c = Counter::new("c");
        let l = Labels::single("k", "v");
        c.inc();
        c.inc_by(4.0, &l).unwrap();

        c.reset();
        assert_eq!(c.value(), 0.0);
        assert_eq!(c.value_for_labels(&l), 0.0);
    }

    #[test]
    fn collect_skips_untouched_unlabeled_when_labeled_exist() {
        let c = Counter::new("c");
        let mut out = Vec::new();
        c.collect(&mut out);
        assert_eq!(out.len(), 1);
        assert!(out[0].tags.is_empty());

        c.inc_by(1.0, &Labels::single("k", "v")).unwrap();
        let mut out = Vec::new();
        c.collect(&mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].tags.get("k"), Some("v"));
    }
}
