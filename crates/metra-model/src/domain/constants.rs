/// Canonical duration buckets (ADR-0007), in seconds.
pub const ADR0007_BUCKETS_SECONDS: [f64; 9] = [0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0];

/// Canonical duration buckets (ADR-0007), in milliseconds.
pub const ADR0007_BUCKETS_MS: [f64; 9] = [
    1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1_000.0, 5_000.0, 10_000.0,
];

/// Prometheus client default buckets, used when neither the caller nor the taxonomy supplies any.
pub const DEFAULT_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adr0007_sets_agree() {
        for (s, ms) in ADR0007_BUCKETS_SECONDS.iter().zip(ADR0007_BUCKETS_MS.iter()) {
            assert!((s * 1_000.0 - ms).abs() < 1e-9);
        }
    }
}
