//! Default instance and logging macro tests.
//!
//! Everything here shares one process-wide instance, so the checks run in a
//! single test to keep their order fixed.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use instrument_core::{ConfigurationError, Level, MemorySink, Scope, TelemetryConfig};

struct Counted<'a>(&'a AtomicUsize);

impl fmt::Display for Counted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fetch_add(1, Ordering::SeqCst);
        f.write_str("counted")
    }
}

#[test]
fn default_instance_and_macros() {
    let telemetry = instrument_core::init(TelemetryConfig {
        listen_for_signals: false,
        ..TelemetryConfig::default()
    })
    .unwrap();
    assert!(Arc::ptr_eq(telemetry, instrument_core::global()));
    assert_eq!(
        instrument_core::init(TelemetryConfig::default()).unwrap_err(),
        ConfigurationError::AlreadyInitialized
    );

    let capture = Arc::new(MemorySink::new());
    instrument_core::use_sink("capture", capture.clone());

    let formats = AtomicUsize::new(0);
    let scope = Scope::root().with("component", "macros");
    instrument_core::debug!(&scope, "skipped {}", Counted(&formats));
    assert_eq!(formats.load(Ordering::SeqCst), 0);

    instrument_core::info!(&scope, "hello {}", Counted(&formats));
    assert_eq!(formats.load(Ordering::SeqCst), 1);

    telemetry.verbosity().set_debug(true);
    instrument_core::debug!(&scope, "now {}", 2);
    instrument_core::error!(&scope, "failed: {}", "timeout");

    let logs = capture.logs();
    let seen: Vec<(Level, &str)> = logs
        .iter()
        .map(|r| (r.level, r.message.as_str()))
        .collect();
    assert_eq!(
        seen,
        vec![
            (Level::Info, "hello counted"),
            (Level::Debug, "now 2"),
            (Level::Error, "failed: timeout"),
        ]
    );
    let location = logs[0].location.unwrap();
    assert!(location.file.ends_with("global_test.rs"));
    assert_eq!(logs[0].tags[0].key, "component");
}
