//! Background flush, rotation and signal workers.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::Telemetry;
use crate::metrics::MetricsRegistry;

impl Telemetry {
    /// Spawn the periodic workers on the current tokio runtime.
    ///
    /// Workers run until the returned guard is shut down or dropped.
    pub fn start(self: &Arc<Self>) -> TelemetryGuard {
        let shutdown = CancellationToken::new();
        let mut handles = vec![
            spawn_flush_worker(self.clone(), self.config.flush_interval, shutdown.clone()),
            spawn_rotate_worker(
                self.metrics.clone(),
                self.config.rotate_interval,
                shutdown.clone(),
            ),
        ];

        #[cfg(unix)]
        {
            if self.config.listen_for_signals {
                handles.push(crate::verbosity::spawn_signal_listener(
                    self.verbosity.clone(),
                    shutdown.clone(),
                ));
            }
        }

        tracing::debug!(
            flush_secs = self.config.flush_interval.as_secs(),
            rotate_secs = self.config.rotate_interval.as_secs(),
            workers = handles.len(),
            "Telemetry workers started"
        );

        TelemetryGuard {
            telemetry: self.clone(),
            shutdown,
            handles,
            finished: false,
        }
    }
}

fn spawn_flush_worker(
    telemetry: Arc<Telemetry>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let report = telemetry.flush();
                    tracing::trace!(metrics = report.metrics, failures = report.sink_failures, "Metrics flushed");
                }
            }
        }
    })
}

fn spawn_rotate_worker(
    metrics: Arc<MetricsRegistry>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => metrics.rotate_all(),
            }
        }
    })
}

/// Owns the background workers of one [`Telemetry`].
///
/// [`TelemetryGuard::shutdown`] stops them and runs a final flush so the
/// last interval's metrics are not lost. Dropping the guard without calling
/// it cancels the workers and flushes synchronously.
pub struct TelemetryGuard {
    telemetry: Arc<Telemetry>,
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
    finished: bool,
}

impl TelemetryGuard {
    /// Token cancelled when the workers are told to stop.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop every worker, wait for them, then flush once more.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        let handles = std::mem::take(&mut self.handles);
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Telemetry worker ended abnormally");
            }
        }
        self.telemetry.flush();
        self.finished = true;
        tracing::debug!("Telemetry workers stopped");
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.shutdown.cancel();
        self.telemetry.flush();
    }
}
