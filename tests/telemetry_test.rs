//! Telemetry lifecycle, verbosity gating and event tests.

use std::sync::Arc;
use std::time::Duration;

use instrument_core::metrics::METRICS_EMITTED_GAUGE;
use instrument_core::sink::{keys, MetricValue};
use instrument_core::{Level, MemorySink, Scope, Telemetry, TelemetryConfig, TimeOrderedIds};

fn config() -> TelemetryConfig {
    TelemetryConfig {
        listen_for_signals: false,
        ..TelemetryConfig::default()
    }
}

fn telemetry_with(config: TelemetryConfig) -> (Arc<Telemetry>, Arc<MemorySink>) {
    let baseline = Arc::new(MemorySink::new());
    let telemetry = Telemetry::builder()
        .baseline(baseline.clone())
        .id_generator(Arc::new(TimeOrderedIds))
        .config(config)
        .build();
    (Arc::new(telemetry), baseline)
}

// =============================================================================
// Verbosity gating
// =============================================================================

#[test]
fn debug_and_trace_are_dropped_by_default() {
    let (telemetry, sink) = telemetry_with(config());
    let scope = Scope::root();
    telemetry.trace(&scope, "hidden");
    telemetry.debug(&scope, "hidden");
    telemetry.info(&scope, "shown");
    let messages: Vec<String> = sink.logs().into_iter().map(|r| r.message).collect();
    assert_eq!(messages, vec!["shown"]);
}

#[test]
fn trace_on_then_off_keeps_debug() {
    let (telemetry, sink) = telemetry_with(config());
    let scope = Scope::root();
    let verbosity = telemetry.verbosity();

    verbosity.set_trace(true);
    telemetry.trace(&scope, "t1");
    telemetry.debug(&scope, "d1");
    verbosity.set_trace(false);
    telemetry.trace(&scope, "t2");
    telemetry.debug(&scope, "d2");

    let messages: Vec<String> = sink.logs().into_iter().map(|r| r.message).collect();
    assert_eq!(messages, vec!["t1", "d1", "d2"]);
}

#[test]
fn config_flags_seed_verbosity_and_silence() {
    let (telemetry, sink) = telemetry_with(TelemetryConfig {
        trace: true,
        silent: true,
        ..config()
    });
    assert!(telemetry.verbosity().is_debug());
    assert!(telemetry.enabled(Level::Trace));
    telemetry.info(&Scope::root(), "muted");
    assert!(sink.is_empty());
}

#[test]
fn log_carries_location_and_tags() {
    let (telemetry, sink) = telemetry_with(config());
    let scope = Scope::root().with("user", "ada");
    telemetry.warn(&scope, "quota low");

    let log = &sink.logs()[0];
    assert_eq!(log.level, Level::Warn);
    let location = log.location.unwrap();
    assert!(location.file.ends_with("telemetry_test.rs"));
    assert!(location.line > 0);
    assert_eq!(log.tags[0].key, "user");
    assert!(log.span_id.is_none());
}

// =============================================================================
// Events
// =============================================================================

#[test]
fn post_event_assigns_id_and_span() {
    let (telemetry, sink) = telemetry_with(config());
    let span = telemetry.begin_span(&Scope::root(), "checkout").unwrap();
    let id = telemetry.post_event(span.scope(), "order.placed", [("order", 991)]);
    let span_id = span.id();
    span.end(None);

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, id);
    assert!(!id.is_nil());
    assert_eq!(events[0].span_id, Some(span_id));
    assert_eq!(events[0].tags[0].key, "order");

    let json = serde_json::to_value(sink.payloads()[0].clone()).unwrap();
    assert_eq!(json[keys::EVENT_NAME], "order.placed");
    assert_eq!(json[keys::EVENT_TRACE_ID], span_id.to_string());
}

// =============================================================================
// Background workers
// =============================================================================

#[tokio::test(start_paused = true)]
async fn flush_worker_runs_on_interval() {
    let (telemetry, sink) = telemetry_with(config());
    telemetry.metrics().counter_add("jobs", 3);
    let guard = telemetry.start();

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(sink.metrics().is_empty());

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(sink.metric("jobs"), Some(MetricValue::Counter(3)));

    guard.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn rotate_worker_ages_out_histograms() {
    let (telemetry, _sink) = telemetry_with(TelemetryConfig {
        rotate_interval: Duration::from_secs(10),
        ..config()
    });
    let h = telemetry.metrics().new_histogram("lat", 0, 100, 2).unwrap();
    h.record_value(5).unwrap();
    let guard = telemetry.start();

    tokio::time::sleep(Duration::from_secs(55)).await;
    assert_eq!(h.count(), 0);

    guard.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_runs_final_flush() {
    let (telemetry, sink) = telemetry_with(config());
    let guard = telemetry.start();
    telemetry.metrics().gauge_set("last.words", 9);

    guard.shutdown().await;
    assert_eq!(sink.metric("last.words"), Some(MetricValue::Gauge(9)));
    assert_eq!(sink.metric(METRICS_EMITTED_GAUGE), Some(MetricValue::Gauge(1)));
}

#[tokio::test]
async fn dropping_guard_flushes() {
    let (telemetry, sink) = telemetry_with(config());
    let guard = telemetry.start();
    telemetry.metrics().counter_add("dropped", 1);
    drop(guard);
    assert_eq!(sink.metric("dropped"), Some(MetricValue::Counter(1)));
}

#[tokio::test]
async fn cancellation_token_is_cancelled_on_shutdown() {
    let (telemetry, _sink) = telemetry_with(config());
    let guard = telemetry.start();
    let token = guard.cancellation_token();
    assert!(!token.is_cancelled());
    guard.shutdown().await;
    assert!(token.is_cancelled());
}
