use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Why a tick runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Fired by the timer. May be skipped by the callee when work is already in flight.
    Scheduled,
    /// Issued once by [`PeriodicTask::stop`] after the loop has ended. Expected to wait for any
    /// in-flight work instead of skipping.
    Final,
}

pub type TickFuture<E> = Pin<Box<dyn Future<Output = Result<(), E>> + Send>>;
pub type TickFn<E> = Arc<dyn Fn(Tick) -> TickFuture<E> + Send + Sync>;
pub type ErrorFn<E> = Arc<dyn Fn(E) + Send + Sync>;

/// Cancellable periodic job.
///
/// Ticks run one at a time on a single tokio task. Ticks that come due while a previous one is
/// still running are skipped rather than queued. A failing tick is reported to `on_error` and
/// the loop carries on.
pub struct PeriodicTask<E> {
    name: String,
    token: CancellationToken,
    join: JoinHandle<()>,
    on_tick: TickFn<E>,
}

impl<E> PeriodicTask<E>
where
    E: Display + Send + 'static,
{
    /// Spawn the loop. The first tick fires one `interval` after start.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        name: impl Into<String>,
        interval: Duration,
        on_tick: TickFn<E>,
        on_error: ErrorFn<E>,
    ) -> Self {
        let name = name.into();
        let token = CancellationToken::new();

        let join = tokio::spawn({
            let token = token.clone();
            let on_tick = Arc::clone(&on_tick);
            let name = name.clone();
            async move {
                let mut ticker = interval_at(Instant::now() + interval, interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                debug!(task = %name, ?interval, "periodic task started");

                loop {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {
                            if let Err(e) = on_tick(Tick::Scheduled).await {
                                on_error(e);
                            }
                        }
                    }
                }
                debug!(task = %name, "periodic task loop exited");
            }
        });

        Self {
            name,
            token,
            join,
            on_tick,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled() && !self.join.is_finished()
    }

    /// Cancel the timer, wait for the in-flight tick, then run one [`Tick::Final`].
    ///
    /// A failure of the final tick is logged and otherwise ignored.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Err(e) = (&mut self.join).await {
            warn!(task = %self.name, error = %e, "periodic task ended abnormally");
        }
        if let Err(e) = (self.on_tick)(Tick::Final).await {
            warn!(task = %self.name, error = %e, "final tick failed");
        }
        debug!(task = %self.name, "periodic task stopped");
    }
}

impl<E> Drop for PeriodicTask<E> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
