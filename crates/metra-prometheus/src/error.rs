use metra_core::CoreError;
use metra_model::MetricKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("prometheus client unavailable: {0}")]
    ClientUnavailable(String),

    #[error("invalid metric name '{0}'")]
    InvalidMetricName(String),

    #[error("invalid label name '{label}' on metric '{metric}'")]
    InvalidLabelName { metric: String, label: String },

    #[error("invalid value for metric '{metric}': {reason}")]
    InvalidValue { metric: String, reason: String },

    #[error("metric '{metric}' exported as both {first} and {second}")]
    KindConflict {
        metric: String,
        first: MetricKind,
        second: MetricKind,
    },

    #[error("failed to register metric '{metric}': {source}")]
    Registration {
        metric: String,
        #[source]
        source: prometheus::Error,
    },

    #[error("metrics source failed: {0}")]
    Source(#[from] CoreError),

    #[error("failed to encode exposition text: {0}")]
    Encode(#[source] prometheus::Error),

    #[error("invalid exporter config: {0}")]
    InvalidConfig(String),

    #[error("duplicate series in exposition: {}", .0.join(", "))]
    DuplicateSeries(Vec<String>),
}

/// Classification used for the `error_type` label of the refresh error counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshErrorKind {
    Validation,
    Registration,
    Timeout,
    Other,
}

impl RefreshErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshErrorKind::Validation => "validation",
            RefreshErrorKind::Registration => "registration",
            RefreshErrorKind::Timeout => "timeout",
            RefreshErrorKind::Other => "other",
        }
    }
}

impl ExporterError {
    pub fn kind(&self) -> RefreshErrorKind {
        match self {
            ExporterError::InvalidMetricName(_)
            | ExporterError::InvalidLabelName { .. }
            | ExporterError::InvalidValue { .. }
            | ExporterError::DuplicateSeries(_) => RefreshErrorKind::Validation,
            ExporterError::Registration { .. } | ExporterError::KindConflict { .. } => {
                RefreshErrorKind::Registration
            }
            ExporterError::Source(CoreError::Timeout(_)) => RefreshErrorKind::Timeout,
            _ => RefreshErrorKind::Other,
        }
    }
}

/// The single error type surfaced by a refresh.
///
/// The underlying failure stays available through [`RefreshError::cause`] and
/// [`std::error::Error::source`].
#[derive(Debug, Error)]
#[error("metrics refresh failed: {cause}")]
pub struct RefreshError {
    #[source]
    cause: ExporterError,
}

impl RefreshError {
    pub fn new(cause: ExporterError) -> Self {
        Self { cause }
    }

    pub fn cause(&self) -> &ExporterError {
        &self.cause
    }

    pub fn into_cause(self) -> ExporterError {
        self.cause
    }

    pub fn kind(&self) -> RefreshErrorKind {
        self.cause.kind()
    }
}

impl From<ExporterError> for RefreshError {
    fn from(cause: ExporterError) -> Self {
        Self::new(cause)
    }
}
