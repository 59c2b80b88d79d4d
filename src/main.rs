//! Walkthrough of the telemetry core against the default instance.
//!
//! Run with `INSTRUMENT_LOG_FORMAT=pretty` for readable output. Send SIGHUP or
//! SIGUSR1 while it sleeps at the end to flip debug or trace output.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;

use instrument_core::telemetry::init_logging;
use instrument_core::{config, IdGenerationError, MetricsFacadeSink, Scope};

#[derive(Debug, Error)]
enum DemoError {
    #[error("unknown error")]
    Unknown,
    #[error(transparent)]
    Id(#[from] IdGenerationError),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cfg = config::load();
    if let Err(e) = init_logging(&cfg.log) {
        eprintln!("Logging setup failed: {}", e);
        return ExitCode::FAILURE;
    }
    let telemetry = match instrument_core::init(cfg) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Telemetry setup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };
    instrument_core::use_sink("metrics-facade", Arc::new(MetricsFacadeSink::new()));
    let guard = telemetry.start();

    let metrics = telemetry.metrics();
    let histogram = match metrics.new_histogram("test.what", 0, 100, 2) {
        Ok(h) => h,
        Err(e) => telemetry.fatal(&Scope::root(), e.to_string()),
    };

    let bare = Scope::root();
    telemetry.post_event(&bare, "Test event", [("source", "demo")]);
    instrument_core::info!(&bare, "This shouldn't have any tags.");
    metrics.counter_add("test.events", 1);
    metrics.gauge_set("test.huh", 24);
    telemetry.flush();

    metrics.gauge_set("test.huh", 69);
    instrument_core::trace!(&bare, "This shouldn't show up.");
    instrument_core::debug!(&bare, "This shouldn't show up.");
    let mut rng = rand::thread_rng();
    for _ in 0..20 {
        if let Err(e) = histogram.record_value(rng.gen_range(0..100)) {
            instrument_core::warn!(&bare, "{}", e);
        }
    }

    let verbosity = telemetry.verbosity();
    verbosity.set_trace(true);
    instrument_core::trace!(&bare, "This should show up.");
    instrument_core::debug!(&bare, "This should show up.");
    verbosity.set_trace(false);
    instrument_core::trace!(&bare, "This shouldn't show up.");
    instrument_core::debug!(&bare, "But this should, since debug stays on.");
    verbosity.set_debug(false);

    let tagged = bare.with("test", "hello");
    instrument_core::info!(&tagged, "This should have a new tag.");

    let outer: Result<(), DemoError> = telemetry.run_span(&tagged, "Span 1", |scope, _| {
        instrument_core::info!(scope, "This should appear inside of the trace.");
        let inner: Result<(), DemoError> = telemetry.run_span(scope, "Span 2", |scope, attach| {
            attach.attach("attempt", 1);
            instrument_core::info!(scope, "This should be parented to Span 2.");
            Err(DemoError::Unknown)
        });
        if let Err(e) = inner {
            instrument_core::warn!(scope, "Span 2 failed: {}", e);
        }
        Ok(())
    });
    if let Err(e) = outer {
        instrument_core::error!(&tagged, "Span 1 failed: {}", e);
    }

    let slow: Result<u64, DemoError> = telemetry
        .run_span_async(&tagged, "Span 3", |scope, _| async move {
            tokio::time::sleep(Duration::from_millis(25)).await;
            instrument_core::info!(&scope, "This span spans a suspension.");
            Ok(25)
        })
        .await;
    if let Ok(ms) = slow {
        metrics.counter_add("test.events", ms);
    }

    telemetry.silence(true);
    instrument_core::info!(&tagged, "This shouldn't show up.");
    telemetry.silence(false);

    let overridden = tagged.with("test", "list");
    instrument_core::info!(&overridden, "This should have a different tag.");
    instrument_core::info!(&tagged, "This should have the original tag.");

    tokio::time::sleep(Duration::from_millis(200)).await;
    guard.shutdown().await;
    ExitCode::SUCCESS
}
