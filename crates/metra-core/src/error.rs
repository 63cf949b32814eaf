use metra_model::MetricKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("metric '{name}' already registered as {existing}, requested {requested}")]
    TypeMismatch {
        name: String,
        existing: MetricKind,
        requested: MetricKind,
    },

    #[error("negative or non-finite increment {delta} for counter '{name}'")]
    InvalidIncrement { name: String, delta: f64 },

    #[error("non-finite observation for histogram '{name}'")]
    InvalidObservation { name: String },

    #[error("invalid buckets for histogram '{name}': {reason}")]
    InvalidBuckets { name: String, reason: String },

    #[error("invalid taxonomy: {0}")]
    InvalidTaxonomy(String),

    #[error("metrics source timed out: {0}")]
    Timeout(String),

    #[error("metrics source unavailable: {0}")]
    Unavailable(String),
}
