use std::sync::{Arc, PoisonError, Weak};
use std::time::{Duration, Instant, SystemTime};

use metra_core::MetricsSource;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::client::{ClientLoader, DefaultClientLoader, Upstream};
use crate::config::ExporterConfig;
use crate::convert::plan;
use crate::error::{ExporterError, RefreshError};
use crate::instrument::{Instruments, Phase, RestartReason};
use crate::task::{ErrorFn, PeriodicTask, Tick, TickFn};

/// Called with every failed background refresh.
pub type RefreshErrorHook = Arc<dyn Fn(&RefreshError) + Send + Sync>;

/// Point-in-time counters of an exporter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExporterStats {
    /// Successful refreshes.
    pub refresh_count: u64,
    /// Failed refreshes.
    pub error_count: u64,
    /// Completion time of the last successful refresh.
    pub last_refresh_time: Option<SystemTime>,
    /// Upstream collectors after the last successful refresh.
    pub metrics_count: usize,
    /// Whether the background refresh task is running.
    pub is_refreshing: bool,
}

#[derive(Debug, Default)]
struct Counters {
    refresh_count: u64,
    error_count: u64,
    last_refresh_time: Option<SystemTime>,
    metrics_count: usize,
}

/// Bridges a [`MetricsSource`] to Prometheus exposition text.
///
/// Every refresh mirrors the source snapshot into upstream collectors: series missing from the
/// snapshot disappear from the output. Refreshes never overlap; the background task skips a tick
/// while any other refresh is in flight.
pub struct PrometheusExporter {
    source: Arc<dyn MetricsSource>,
    config: ExporterConfig,
    loader: Arc<dyn ClientLoader>,
    upstream: Mutex<Option<Upstream>>,
    gate: Mutex<()>,
    counters: std::sync::Mutex<Counters>,
    task: Mutex<Option<PeriodicTask<RefreshError>>>,
    instruments: Instruments,
}

impl PrometheusExporter {
    /// Build an exporter around `source`. The upstream client is resolved on first use.
    pub fn new(source: Arc<dyn MetricsSource>, config: ExporterConfig) -> Result<Self, ExporterError> {
        config.validate()?;
        let instruments = Instruments::new(Arc::clone(&source), config.instrument);
        debug!(namespace = %config.namespace, subsystem = %config.subsystem, "exporter created");

        Ok(Self {
            source,
            config,
            loader: Arc::new(DefaultClientLoader),
            upstream: Mutex::new(None),
            gate: Mutex::new(()),
            counters: std::sync::Mutex::new(Counters::default()),
            task: Mutex::new(None),
            instruments,
        })
    }

    /// Replace the upstream client loader. Only effective before the first refresh or scrape.
    pub fn with_loader(mut self, loader: Arc<dyn ClientLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn config(&self) -> &ExporterConfig {
        &self.config
    }

    /// Pull a snapshot and mirror it upstream, waiting for any refresh already in flight.
    #[instrument(level = "debug", skip(self))]
    pub async fn refresh(&self) -> Result<(), RefreshError> {
        let _gate = self.gate.lock().await;
        self.refresh_locked().await
    }

    /// Like [`refresh`](Self::refresh), but returns `Ok(false)` immediately when another refresh
    /// is in flight.
    pub async fn try_refresh(&self) -> Result<bool, RefreshError> {
        let Ok(_gate) = self.gate.try_lock() else {
            debug!("refresh already in flight; skipping");
            return Ok(false);
        };
        self.refresh_locked().await.map(|()| true)
    }

    /// Exposition text of the current upstream state.
    pub async fn get_metrics(&self) -> Result<String, ExporterError> {
        self.client().await?.encode()
    }

    pub fn get_stats(&self) -> ExporterStats {
        let counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let is_refreshing = self
            .task
            .try_lock()
            .map(|t| t.as_ref().is_some_and(PeriodicTask::is_running))
            .unwrap_or(true);

        ExporterStats {
            refresh_count: counters.refresh_count,
            error_count: counters.error_count,
            last_refresh_time: counters.last_refresh_time,
            metrics_count: counters.metrics_count,
            is_refreshing,
        }
    }

    /// Whether the background refresh task is running.
    pub async fn is_refreshing(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(PeriodicTask::is_running)
    }

    /// Start refreshing every `interval` in the background.
    ///
    /// A task that is already running is stopped first (including its final refresh) and the
    /// restart is recorded as `config_change`.
    #[instrument(level = "debug", skip(self, on_error))]
    pub async fn start_refresh(
        self: &Arc<Self>,
        interval: Duration,
        on_error: Option<RefreshErrorHook>,
    ) -> Result<(), ExporterError> {
        if interval.is_zero() {
            return Err(ExporterError::InvalidConfig(
                "refresh interval must be positive".into(),
            ));
        }

        let mut slot = self.task.lock().await;
        if let Some(previous) = slot.take() {
            info!("restarting background refresh");
            previous.stop().await;
            self.record_restart(RestartReason::ConfigChange);
        }

        let weak = Arc::downgrade(self);
        let on_tick: TickFn<RefreshError> = Arc::new(move |tick| {
            let weak: Weak<Self> = weak.clone();
            Box::pin(async move {
                let Some(exporter) = weak.upgrade() else {
                    return Ok(());
                };
                match tick {
                    Tick::Scheduled => exporter.try_refresh().await.map(|_| ()),
                    Tick::Final => exporter.refresh().await,
                }
            })
        });
        let on_error: ErrorFn<RefreshError> = Arc::new(move |e| {
            if let Some(hook) = &on_error {
                hook(&e);
            }
        });

        *slot = Some(PeriodicTask::start(
            "metrics-refresh",
            interval,
            on_tick,
            on_error,
        ));
        info!(?interval, "background refresh started");
        Ok(())
    }

    /// Stop the background task and run one last refresh. Does nothing when no task runs.
    ///
    /// Must be awaited for the final refresh to happen.
    pub async fn stop_refresh(&self) {
        let Some(task) = self.task.lock().await.take() else {
            debug!("background refresh not running");
            return;
        };
        task.stop().await;
        info!("background refresh stopped");
    }

    pub fn record_restart(&self, reason: RestartReason) {
        debug!(%reason, "refresh restart recorded");
        self.instruments.restart(reason);
    }

    /// Count one served request. `path` must already be bounded (e.g. `unmatched` for 404s).
    pub fn record_http_request(&self, status: u16, path: &str, is_error: bool) {
        self.instruments.http(status, path, is_error);
    }

    async fn client(&self) -> Result<MappedMutexGuard<'_, Upstream>, ExporterError> {
        let mut guard = self.upstream.lock().await;
        if guard.is_none() {
            let registry = self.loader.load()?;
            info!("prometheus client initialized");
            *guard = Some(Upstream::new(registry));
        }
        MutexGuard::try_map(guard, Option::as_mut)
            .map_err(|_| ExporterError::ClientUnavailable("client not initialized".into()))
    }

    async fn refresh_locked(&self) -> Result<(), RefreshError> {
        self.instruments.inflight(true);
        let started = Instant::now();
        let result = self.mirror().await;
        let elapsed = started.elapsed();
        self.instruments.inflight(false);

        self.instruments.refresh_finished(result.is_ok());
        self.instruments.phase(Phase::Total, result.is_ok(), elapsed);

        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        match result {
            Ok(collectors) => {
                counters.refresh_count += 1;
                counters.last_refresh_time = Some(SystemTime::now());
                counters.metrics_count = collectors;
                debug!(collectors, ?elapsed, "metrics refreshed");
                Ok(())
            }
            Err(e) => {
                counters.error_count += 1;
                let err = RefreshError::new(e);
                self.instruments.refresh_failed(err.kind());
                warn!(error = %err, kind = err.kind().as_str(), "metrics refresh failed");
                Err(err)
            }
        }
    }

    async fn mirror(&self) -> Result<usize, ExporterError> {
        let mut upstream = self.client().await?;

        let started = Instant::now();
        let snapshot = self.source.export().await;
        self.instruments
            .phase(Phase::Export, snapshot.is_ok(), started.elapsed());
        let events = snapshot?;

        let started = Instant::now();
        let applied = plan(&events, &self.config).and_then(|p| upstream.apply(&p));
        self.instruments
            .phase(Phase::Convert, applied.is_ok(), started.elapsed());
        applied?;

        Ok(upstream.collector_count())
    }
}
