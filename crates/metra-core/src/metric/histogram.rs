use std::sync::{Arc, RwLock};

use metra_model::{BucketCount, HistogramSummary, Labels, MetricsEvent};

use crate::error::CoreError;
use crate::metric::{Series, read, write};

#[derive(Debug, Clone)]
struct Cell {
    /// Non-cumulative count per bucket.
    hits: Vec<u64>,
    count: u64,
    sum: f64,
}

impl Cell {
    fn new(buckets: usize) -> Self {
        Self {
            hits: vec![0; buckets],
            count: 0,
            sum: 0.0,
        }
    }

    fn summary(&self, bounds: &[f64]) -> HistogramSummary {
        let mut cumulative = 0;
        let buckets = bounds
            .iter()
            .zip(&self.hits)
            .map(|(&le, &hits)| {
                cumulative += hits;
                BucketCount::new(le, cumulative)
            })
            .collect();

        HistogramSummary {
            buckets,
            count: self.count,
            sum: self.sum,
        }
    }
}

/// Distribution of observations over bucket boundaries fixed at creation.
///
/// Observations above the highest boundary count towards `count` and `sum` of the summary but
/// land in no finite bucket.
#[derive(Debug, Clone)]
pub struct Histogram {
    name: Arc<str>,
    bounds: Arc<[f64]>,
    series: Arc<RwLock<Series<Cell>>>,
}

impl Histogram {
    pub(crate) fn new(name: &str, bounds: &[f64]) -> Result<Self, CoreError> {
        validate_bounds(name, bounds)?;
        Ok(Self {
            name: Arc::from(name),
            bounds: Arc::from(bounds),
            series: Arc::new(RwLock::new(Series::default())),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn buckets(&self) -> &[f64] {
        &self.bounds
    }

    pub fn observe(&self, value: f64, labels: &Labels) -> Result<(), CoreError> {
        if !value.is_finite() {
            return Err(CoreError::InvalidObservation {
                name: self.name.to_string(),
            });
        }
        let idx = self.bounds.iter().position(|&le| value <= le);

        let mut series = write(&self.series);
        let cell = series.entry(labels, || Cell::new(self.bounds.len()));
        if let Some(idx) = idx {
            cell.hits[idx] += 1;
        }
        cell.count += 1;
        cell.sum += value;
        Ok(())
    }

    /// Cumulative summary for the given label set, if it was ever observed.
    pub fn summary_for_labels(&self, labels: &Labels) -> Option<HistogramSummary> {
        read(&self.series)
            .get(labels)
            .map(|cell| cell.summary(&self.bounds))
    }

    pub fn reset(&self) {
        write(&self.series).clear();
    }

    pub(crate) fn collect(&self, out: &mut Vec<MetricsEvent>) {
        read(&self.series).visit(
            || Cell::new(self.bounds.len()),
            |labels, cell| {
                out.push(MetricsEvent::histogram(
                    &*self.name,
                    cell.summary(&self.bounds),
                    labels.clone(),
                ))
            },
        );
    }
}

fn validate_bounds(name: &str, bounds: &[f64]) -> Result<(), CoreError> {
    let fail = |reason: &str| CoreError::InvalidBuckets {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if bounds.is_empty() {
        return Err(fail("at least one bucket is required"));
    }
    if bounds.iter().any(|b| !b.is_finite()) {
        return Err(fail("bounds must be finite"));
    }
    if bounds.windows(2).any(|w| w[0] >= w[1]) {
        return Err(fail("bounds must be strictly increasing"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_is_cumulative() {
        let h = Histogram::new("latency_ms", &[10.0, 50.0, 100.0]).unwrap();
        for v in [1.0, 10.0, 20.0, 30.0, 49.0] {
            h.observe(v, &Labels::new()).unwrap();
        }

        let s = h.summary_for_labels(&Labels::new()).unwrap();
        assert_eq!(
            s.buckets,
            vec![
                BucketCount::new(10.0, 2),
                BucketCount::new(50.0, 5),
                BucketCount::new(100.0, 5),
            ]
        );
        assert_eq!(s.count, 5);
        assert_eq!(s.sum, 110.0);
        assert!(s.is_well_formed());
    }

    #[test]
    fn overflow_counts_but_has_no_bucket() {
        let h = Histogram::new("h", &[1.0]).unwrap();
        h.observe(5.0, &Labels::new()).unwrap();

        let s = h.summary_for_labels(&Labels::new()).unwrap();
        assert_eq!(s.buckets[0].count, 0);
        assert_eq!(s.count, 1);
    }

    #[test]
    fn rejects_bad_bounds() {
        assert!(Histogram::new("h", &[]).is_err());
        assert!(Histogram::new("h", &[2.0, 1.0]).is_err());
        assert!(Histogram::new("h", &[1.0, f64::INFINITY]).is_err());
    }

    #[test]
    fn rejects_non_finite_observations() {
        let h = Histogram::new("h", &[1.0]).unwrap();
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                h.observe(value, &Labels::new()),
                Err(CoreError::InvalidObservation { .. })
            ));
        }
        assert!(h.summary_for_labels(&Labels::new()).is_none());
    }
}
