//! Sink registration and dispatch isolation tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use instrument_core::sink::{LogRecord, BASELINE_SINK};
use instrument_core::{
    sink_fn, ConfigurationError, Level, MemorySink, Payload, Scope, SinkError, SinkRegistry,
    Telemetry, TelemetryConfig,
};

fn log_payload(scope: &Scope, message: &str) -> Payload {
    Payload::Log(LogRecord {
        level: Level::Info,
        timestamp: chrono::Utc::now(),
        location: None,
        message: message.to_string(),
        span_id: scope.span_id(),
        depth: scope.depth(),
        tags: scope.snapshot(),
    })
}

fn failing_sink() -> Arc<dyn instrument_core::Sink> {
    Arc::new(sink_fn(|_| Err(SinkError::Rejected("disk full".into()))))
}

fn telemetry_with_baseline() -> (Telemetry, Arc<MemorySink>) {
    let baseline = Arc::new(MemorySink::new());
    let telemetry = Telemetry::builder()
        .baseline(baseline.clone())
        .config(TelemetryConfig::default())
        .build();
    (telemetry, baseline)
}

// =============================================================================
// Registration
// =============================================================================

#[test]
fn duplicate_global_sink_is_rejected() {
    let registry = SinkRegistry::new(Arc::new(MemorySink::new()));
    registry
        .register_global("audit", Arc::new(MemorySink::new()))
        .unwrap();
    let version = registry.version();

    let err = registry
        .register_global("audit", Arc::new(MemorySink::new()))
        .unwrap_err();
    assert_eq!(err, ConfigurationError::DuplicateSink("audit".into()));
    assert_eq!(registry.version(), version);
    assert_eq!(registry.names(), vec![BASELINE_SINK, "audit"]);
}

#[test]
fn scoped_sink_colliding_with_global_is_rejected() {
    let registry = SinkRegistry::new(Arc::new(MemorySink::new()));
    registry
        .register_global("audit", Arc::new(MemorySink::new()))
        .unwrap();
    let err = registry
        .register_scoped(&Scope::root(), "audit", Arc::new(MemorySink::new()))
        .unwrap_err();
    assert_eq!(err, ConfigurationError::DuplicateSink("audit".into()));
}

#[test]
fn scoped_sink_colliding_with_ancestor_is_rejected() {
    let registry = SinkRegistry::new(Arc::new(MemorySink::new()));
    let scope = registry
        .register_scoped(&Scope::root(), "capture", Arc::new(MemorySink::new()))
        .unwrap();
    let child = scope.with("k", "v");
    assert!(registry
        .register_scoped(&child, "capture", Arc::new(MemorySink::new()))
        .is_err());
    // A sibling lineage without the sink may use the name.
    assert!(registry
        .register_scoped(&Scope::root(), "capture", Arc::new(MemorySink::new()))
        .is_ok());
}

// =============================================================================
// Dispatch
// =============================================================================

#[test]
fn scoped_sinks_only_receive_their_lineage() {
    let registry = SinkRegistry::new(Arc::new(MemorySink::new()));
    let local = Arc::new(MemorySink::new());
    let scoped = registry
        .register_scoped(&Scope::root(), "local", local.clone())
        .unwrap();
    let derived = scoped.with("user", "ada");

    registry.dispatch(&derived, &log_payload(&derived, "inside"));
    registry.dispatch(&Scope::root(), &log_payload(&Scope::root(), "outside"));

    let messages: Vec<String> = local.logs().into_iter().map(|r| r.message).collect();
    assert_eq!(messages, vec!["inside"]);
    assert_eq!(derived.local_sink_names(), vec!["local"]);
}

#[test]
fn failing_sink_does_not_block_others() {
    let (telemetry, baseline) = telemetry_with_baseline();
    let healthy = Arc::new(MemorySink::new());
    telemetry.use_sink("broken", failing_sink()).unwrap();
    telemetry.use_sink("healthy", healthy.clone()).unwrap();

    let scope = Scope::root().with("job", "nightly");
    let outcome = telemetry
        .sinks()
        .dispatch(&scope, &log_payload(&scope, "hello"));

    assert_eq!(outcome.delivered, 2);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].sink, "broken");
    assert_eq!(healthy.logs().len(), 1);

    let logs = baseline.logs();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].message, "hello");
    assert_eq!(logs[1].level, Level::Error);
    assert!(logs[1].message.contains("'broken'"));
    assert!(logs[1].message.contains("disk full"));
}

#[test]
fn panicking_sink_is_contained() {
    let (telemetry, baseline) = telemetry_with_baseline();
    let healthy = Arc::new(MemorySink::new());
    telemetry
        .use_sink("panicky", Arc::new(sink_fn(|_| panic!("sink bug"))))
        .unwrap();
    telemetry.use_sink("healthy", healthy.clone()).unwrap();

    telemetry.info(&Scope::root(), "still delivered");

    assert_eq!(healthy.logs().len(), 1);
    let reports: Vec<_> = baseline
        .logs()
        .into_iter()
        .filter(|r| r.level == Level::Error)
        .collect();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].message.contains("sink bug"));
}

#[test]
fn failure_report_is_not_sent_to_failing_sink() {
    let (telemetry, _baseline) = telemetry_with_baseline();
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = calls.clone();
    telemetry
        .use_sink(
            "flaky",
            Arc::new(sink_fn(move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
                Err(SinkError::Rejected("nope".into()))
            })),
        )
        .unwrap();

    telemetry.warn(&Scope::root(), "one");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn silenced_baseline_still_receives_failure_reports() {
    let (telemetry, baseline) = telemetry_with_baseline();
    telemetry.use_sink("broken", failing_sink()).unwrap();
    telemetry.silence(true);

    telemetry.info(&Scope::root(), "muted");

    let logs = baseline.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].level, Level::Error);
}

#[test]
fn dispatch_is_safe_during_registration() {
    let (telemetry, _baseline) = telemetry_with_baseline();
    let telemetry = Arc::new(telemetry);

    let writer = {
        let telemetry = telemetry.clone();
        thread::spawn(move || {
            for i in 0..50 {
                telemetry
                    .use_sink(format!("sink-{}", i), Arc::new(MemorySink::new()))
                    .unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let telemetry = telemetry.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    let outcome = telemetry
                        .sinks()
                        .dispatch(&Scope::root(), &log_payload(&Scope::root(), "x"));
                    assert!(outcome.is_clean());
                    assert!(outcome.delivered >= 1);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(telemetry.sinks().names().len(), 51);
}
