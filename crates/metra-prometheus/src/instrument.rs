//! Metrics the exporter records about itself, into the source it exports.
//!
//! Names are given before the namespace/subsystem prefix is applied. Recording never fails the
//! caller: write errors are dropped with a trace event.
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use metra_core::{MetricsSource, Record};
use metra_model::{ADR0007_BUCKETS_SECONDS, Labels};
use tracing::trace;

use crate::error::RefreshErrorKind;

pub const REFRESH_TOTAL: &str = "refresh_total";
pub const REFRESH_ERRORS_TOTAL: &str = "refresh_errors_total";
pub const REFRESH_DURATION_SECONDS: &str = "refresh_duration_seconds";
pub const REFRESH_INFLIGHT: &str = "refresh_inflight";
pub const RESTARTS_TOTAL: &str = "restarts_total";
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_ERRORS_TOTAL: &str = "http_errors_total";

/// Stage of a refresh cycle, used as the `phase` label of the duration histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Pulling the snapshot from the source.
    Export,
    /// Validation plus upstream update.
    Convert,
    Total,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Export => "export",
            Phase::Convert => "convert",
            Phase::Total => "total",
        }
    }
}

/// Why the background refresh was restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    ConfigChange,
    Error,
    Manual,
    Other,
}

impl RestartReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestartReason::ConfigChange => "config_change",
            RestartReason::Error => "error",
            RestartReason::Manual => "manual",
            RestartReason::Other => "other",
        }
    }
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn outcome(ok: bool) -> &'static str {
    if ok { "success" } else { "error" }
}

pub(crate) struct Instruments {
    source: Arc<dyn MetricsSource>,
    /// Gates the refresh-cycle metrics. Restart and HTTP counters are explicit calls and always
    /// recorded.
    refresh: bool,
}

impl Instruments {
    pub fn new(source: Arc<dyn MetricsSource>, refresh: bool) -> Self {
        Self { source, refresh }
    }

    pub fn refresh_finished(&self, ok: bool) {
        if self.refresh {
            self.increment(REFRESH_TOTAL, Labels::single("result", outcome(ok)));
        }
    }

    pub fn refresh_failed(&self, kind: RefreshErrorKind) {
        if self.refresh {
            self.increment(REFRESH_ERRORS_TOTAL, Labels::single("error_type", kind.as_str()));
        }
    }

    pub fn phase(&self, phase: Phase, ok: bool, elapsed: Duration) {
        if !self.refresh {
            return;
        }
        let labels = Labels::single("phase", phase.as_str()).with("result", outcome(ok));
        self.write(Record::Observe {
            name: REFRESH_DURATION_SECONDS,
            buckets: &ADR0007_BUCKETS_SECONDS,
            value: elapsed.as_secs_f64(),
            labels: &labels,
        });
    }

    pub fn inflight(&self, active: bool) {
        if self.refresh {
            self.write(Record::Set {
                name: REFRESH_INFLIGHT,
                value: if active { 1.0 } else { 0.0 },
                labels: &Labels::new(),
            });
        }
    }

    pub fn restart(&self, reason: RestartReason) {
        self.increment(RESTARTS_TOTAL, Labels::single("reason", reason.as_str()));
    }

    pub fn http(&self, status: u16, path: &str, is_error: bool) {
        let labels = Labels::single("status", status.to_string()).with("path", path);
        self.increment(HTTP_REQUESTS_TOTAL, labels.clone());
        if is_error {
            self.increment(HTTP_ERRORS_TOTAL, labels);
        }
    }

    fn increment(&self, name: &str, labels: Labels) {
        self.write(Record::Increment {
            name,
            delta: 1.0,
            labels: &labels,
        });
    }

    fn write(&self, record: Record<'_>) {
        if let Err(e) = self.source.record(record) {
            trace!(error = %e, "self-instrumentation write dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use metra_core::MetricsRegistry;

    use super::*;

    #[test]
    fn records_into_source() {
        let registry = MetricsRegistry::new();
        let instruments = Instruments::new(Arc::new(registry.clone()), true);

        instruments.refresh_finished(true);
        instruments.refresh_failed(RefreshErrorKind::Validation);
        instruments.phase(Phase::Total, true, Duration::from_millis(3));
        instruments.http(401, "/metrics", true);

        let ok = Labels::single("result", "success");
        assert_eq!(registry.counter(REFRESH_TOTAL).unwrap().value_for_labels(&ok), 1.0);

        let http = Labels::single("status", "401").with("path", "/metrics");
        assert_eq!(
            registry.counter(HTTP_ERRORS_TOTAL).unwrap().value_for_labels(&http),
            1.0
        );

        let phase = Labels::single("phase", "total").with("result", "success");
        let summary = registry
            .histogram(REFRESH_DURATION_SECONDS, None)
            .unwrap()
            .summary_for_labels(&phase)
            .unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.bounds(), ADR0007_BUCKETS_SECONDS.to_vec());
    }

    #[test]
    fn disabled_refresh_metrics_still_count_http() {
        let registry = MetricsRegistry::new();
        let instruments = Instruments::new(Arc::new(registry.clone()), false);

        instruments.refresh_finished(true);
        instruments.inflight(true);
        instruments.http(200, "/metrics", false);

        assert_eq!(registry.names(), vec![HTTP_REQUESTS_TOTAL.to_string()]);
    }

    #[test]
    fn write_failures_are_swallowed() {
        let registry = MetricsRegistry::new();
        registry.gauge(RESTARTS_TOTAL).unwrap();
        let instruments = Instruments::new(Arc::new(registry.clone()), true);

        instruments.restart(RestartReason::Manual);
        assert_eq!(registry.gauge(RESTARTS_TOTAL).unwrap().value(), 0.0);
    }
}
