//! Histogram reconstruction from cumulative bucket summaries.
//!
//! The upstream client only accepts individual observations, so a summary is replayed as synthetic
//! observations: bucket `i` contributes `count[i] - count[i-1]` observations at the midpoint of
//! its range, `le[0] / 2` for the first bucket and `(le[i-1] + le[i]) / 2` afterwards.
//!
//! This is an approximation. Original values cannot be recovered from bucket counts, so exported
//! `_sum` values and percentile estimates are only as precise as the bucket widths. Bucket counts
//! themselves survive exactly: each midpoint falls inside the bucket it came from. The rule is
//! fixed so output stays comparable with other implementations; do not "improve" it.
use metra_model::HistogramSummary;

/// `times` synthetic observations at `value`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub value: f64,
    pub times: u64,
}

/// Replay plan for `summary`, in bucket order. Buckets without new observations are omitted.
pub fn reconstruct(summary: &HistogramSummary) -> Vec<Observation> {
    let mut out = Vec::with_capacity(summary.buckets.len());
    let mut prev_le: Option<f64> = None;
    let mut prev_count = 0u64;

    for bucket in &summary.buckets {
        let delta = bucket.count.saturating_sub(prev_count);
        let value = match prev_le {
            None => bucket.le / 2.0,
            Some(lower) => (lower + bucket.le) / 2.0,
        };
        if delta > 0 {
            out.push(Observation {
                value,
                times: delta,
            });
        }
        prev_le = Some(bucket.le);
        prev_count = bucket.count;
    }
    out
}

/// Total number of synthetic observations in a plan.
pub fn total_observations(plan: &[Observation]) -> u64 {
    plan.iter().map(|o| o.times).sum()
}
