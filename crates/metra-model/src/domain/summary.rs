use serde::{Deserialize, Serialize};

/// One cumulative histogram bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketCount {
    /// Inclusive upper bound.
    pub le: f64,
    /// Number of observations less than or equal to `le`.
    pub count: u64,
}

impl BucketCount {
    pub fn new(le: f64, count: u64) -> Self {
        Self { le, count }
    }
}

/// Cumulative (OTLP-style) bucket representation of a histogram.
///
/// `buckets` are ordered by strictly increasing `le` and carry cumulative, non-decreasing counts.
/// `count` and `sum` describe every raw observation, including those above the highest bound,
/// which no finite bucket holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramSummary {
    pub buckets: Vec<BucketCount>,
    pub count: u64,
    pub sum: f64,
}

impl HistogramSummary {
    /// Build a summary from cumulative buckets alone.
    ///
    /// `count` is taken from the last bucket and `sum` is unknown (zero).
    pub fn new(buckets: Vec<BucketCount>) -> Self {
        let count = buckets.last().map(|b| b.count).unwrap_or(0);
        Self {
            buckets,
            count,
            sum: 0.0,
        }
    }

    /// Build a summary from `(le, cumulative_count)` pairs.
    pub fn from_cumulative(pairs: &[(f64, u64)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|&(le, count)| BucketCount::new(le, count))
                .collect(),
        )
    }

    /// Upper bounds in order.
    pub fn bounds(&self) -> Vec<f64> {
        self.buckets.iter().map(|b| b.le).collect()
    }

    /// Highest finite upper bound.
    pub fn max_le(&self) -> Option<f64> {
        self.buckets.last().map(|b| b.le)
    }

    /// Returns `true` if bounds are finite and strictly increasing and counts are non-decreasing.
    pub fn is_well_formed(&self) -> bool {
        if self.buckets.iter().any(|b| !b.le.is_finite()) {
            return false;
        }
        self.buckets
            .windows(2)
            .all(|w| w[0].le < w[1].le && w[0].count <= w[1].count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_defaults_to_last_bucket() {
        let s = HistogramSummary::from_cumulative(&[(10.0, 2), (50.0, 5), (100.0, 5)]);
        assert_eq!(s.count, 5);
        assert_eq!(s.max_le(), Some(100.0));
        assert_eq!(s.bounds(), vec![10.0, 50.0, 100.0]);
    }

    #[test]
    fn well_formed_rejects_bad_shapes() {
        assert!(HistogramSummary::from_cumulative(&[(1.0, 1), (2.0, 3)]).is_well_formed());
        assert!(HistogramSummary::from_cumulative(&[]).is_well_formed());

        // decreasing counts
        assert!(!HistogramSummary::from_cumulative(&[(1.0, 3), (2.0, 1)]).is_well_formed());
        // repeated bound
        assert!(!HistogramSummary::from_cumulative(&[(1.0, 1), (1.0, 2)]).is_well_formed());
        // non-finite bound
        assert!(!HistogramSummary::from_cumulative(&[(f64::INFINITY, 1)]).is_well_formed());
    }
}
