mod labels;
pub use labels::Labels;

mod summary;
pub use summary::{BucketCount, HistogramSummary};

mod event;
pub use event::{MetricKind, MetricValue, MetricsEvent};

mod constants;
pub use constants::{ADR0007_BUCKETS_MS, ADR0007_BUCKETS_SECONDS, DEFAULT_BUCKETS};
