use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::exporter::PrometheusExporter;

/// Process termination signals a facility can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// SIGTERM.
    Terminate,
    /// SIGINT / Ctrl+C.
    Interrupt,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Signal::Terminate => "terminate",
            Signal::Interrupt => "interrupt",
        })
    }
}

pub type ShutdownCallback =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Something that runs callbacks when the process is asked to terminate.
pub trait SignalFacility: Send + Sync {
    fn on_signal(&self, signal: Signal, callback: ShutdownCallback);
}

/// Stop `exporter`'s background refresh (with its final flush) on terminate and interrupt.
pub fn register_prometheus_shutdown(exporter: &Arc<PrometheusExporter>, facility: &dyn SignalFacility) {
    let exporter = Arc::clone(exporter);
    let callback: ShutdownCallback = Arc::new(move || {
        let exporter = Arc::clone(&exporter);
        Box::pin(async move {
            info!("shutdown signal: stopping metrics refresh");
            exporter.stop_refresh().await;
        })
    });

    facility.on_signal(Signal::Terminate, Arc::clone(&callback));
    facility.on_signal(Signal::Interrupt, callback);
    debug!("prometheus shutdown hooks registered");
}

/// [`SignalFacility`] backed by `tokio::signal`.
///
/// Callbacks run in registration order when [`TokioSignals::wait`] observes a signal.
#[derive(Default)]
pub struct TokioSignals {
    callbacks: Mutex<Vec<(Signal, ShutdownCallback)>>,
}

impl TokioSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for SIGINT or (on unix) SIGTERM, run the matching callbacks, return the signal.
    pub async fn wait(&self) -> io::Result<Signal> {
        let signal = recv().await?;
        info!(%signal, "signal received, starting graceful shutdown");
        self.fire(signal).await;
        Ok(signal)
    }

    /// Run the callbacks registered for `signal`.
    pub async fn fire(&self, signal: Signal) {
        let matching: Vec<ShutdownCallback> = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(s, _)| *s == signal)
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in matching {
            callback().await;
        }
    }
}

impl SignalFacility for TokioSignals {
    fn on_signal(&self, signal: Signal, callback: ShutdownCallback) {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((signal, callback));
    }
}

#[cfg(unix)]
async fn recv() -> io::Result<Signal> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.map(|()| Signal::Interrupt),
        _ = terminate.recv() => Ok(Signal::Terminate),
    }
}

#[cfg(not(unix))]
async fn recv() -> io::Result<Signal> {
    tokio::signal::ctrl_c().await.map(|()| Signal::Interrupt)
}
