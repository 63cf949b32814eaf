//! Prometheus exposition bridge for a [`metra_core::MetricsRegistry`].
//!
//! [`PrometheusExporter`] pulls registry snapshots, validates and converts them into upstream
//! `prometheus` collectors, and renders exposition text. Refreshes run on demand or from a
//! background [`PeriodicTask`] that never overlaps itself and flushes once more on stop.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use metra_core::MetricsRegistry;
//! use metra_model::Labels;
//! use metra_prometheus::{ExporterConfig, PrometheusExporter};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = MetricsRegistry::new();
//! registry
//!     .counter("requests_total")?
//!     .inc_by(1.0, &Labels::single("status", "200"))?;
//!
//! let exporter = PrometheusExporter::new(Arc::new(registry.clone()), ExporterConfig::default())?;
//! exporter.refresh().await?;
//!
//! let text = exporter.get_metrics().await?;
//! assert!(text.contains("app_metrics_requests_total{status=\"200\"} 1"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Self-instrumentation
//! Written into the exported source, so prefixed like everything else:
//! - `refresh_total{result}` - Counter
//! - `refresh_errors_total{error_type}` - Counter
//! - `refresh_duration_seconds{phase, result}` - Histogram
//! - `refresh_inflight` - Gauge
//! - `restarts_total{reason}` - Counter
//! - `http_requests_total{status, path}` - Counter
//! - `http_errors_total{status, path}` - Counter
//!
//! ## Histograms
//! Cumulative summaries are replayed as synthetic observations at bucket midpoints; see
//! [`reconstruct`]. Bucket counts are exact, `_sum` is approximate.

mod client;
pub use client::{ClientLoader, DefaultClientLoader};

mod config;
pub use config::{
    AppIdentity, DEFAULT_NAMESPACE, DEFAULT_SUBSYSTEM, EnvIdentity, ExporterConfig,
    IdentityProvider,
};

mod convert;

mod error;
pub use error::{ExporterError, RefreshError, RefreshErrorKind};

mod exporter;
pub use exporter::{ExporterStats, PrometheusExporter, RefreshErrorHook};

pub mod instrument;
pub use instrument::{Phase, RestartReason};

mod lifecycle;
pub use lifecycle::{
    ShutdownCallback, Signal, SignalFacility, TokioSignals, register_prometheus_shutdown,
};

pub mod naming;

pub mod reconstruct;
pub use reconstruct::{Observation, reconstruct};

mod task;
pub use task::{ErrorFn, PeriodicTask, Tick, TickFn, TickFuture};

mod validate;
pub use validate::{ensure_unique_series, find_duplicate_series};

pub use prometheus::{Registry, TEXT_FORMAT};
