//! Global and scope-local sink registration with isolated dispatch.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::Utc;
use parking_lot::Mutex;

use super::payload::{LogRecord, Payload};
use super::Sink;
use crate::error::{ConfigurationError, SinkDispatchError};
use crate::level::Level;
use crate::scope::Scope;
use crate::value::Tag;

/// Name under which the always-present fallback sink is registered.
pub const BASELINE_SINK: &str = "baseline";

#[derive(Clone)]
struct NamedSink {
    name: String,
    sink: Arc<dyn Sink>,
}

/// Immutable view of the global tier. Replaced wholesale on registration.
struct SinkTable {
    version: u64,
    sinks: Vec<NamedSink>,
}

/// Result of delivering one payload.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Number of sinks that accepted the payload.
    pub delivered: usize,
    pub failed: Vec<SinkDispatchError>,
}

impl DispatchOutcome {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fans payloads out to registered sinks.
///
/// Readers load an atomically published table and never block. Writers
/// serialize on a mutex and publish a new table with a bumped version.
pub struct SinkRegistry {
    table: ArcSwap<SinkTable>,
    registration: Mutex<()>,
    baseline: Arc<dyn Sink>,
    baseline_silenced: AtomicBool,
}

impl SinkRegistry {
    pub fn new(baseline: Arc<dyn Sink>) -> Self {
        let table = SinkTable {
            version: 1,
            sinks: vec![NamedSink {
                name: BASELINE_SINK.to_string(),
                sink: baseline.clone(),
            }],
        };
        Self {
            table: ArcSwap::from_pointee(table),
            registration: Mutex::new(()),
            baseline,
            baseline_silenced: AtomicBool::new(false),
        }
    }

    /// Add a process-wide sink. Fails if `name` is already registered.
    pub fn register_global(
        &self,
        name: impl Into<String>,
        sink: Arc<dyn Sink>,
    ) -> Result<(), ConfigurationError> {
        let name = name.into();
        let _guard = self.registration.lock();

        let current = self.table.load();
        if current.sinks.iter().any(|s| s.name == name) {
            return Err(ConfigurationError::DuplicateSink(name));
        }

        let mut sinks = current.sinks.clone();
        sinks.push(NamedSink { name: name.clone(), sink });
        self.table.store(Arc::new(SinkTable {
            version: current.version + 1,
            sinks,
        }));

        tracing::debug!(sink = %name, "Registered global sink");
        Ok(())
    }

    /// Derive a scope that additionally delivers to `sink`.
    ///
    /// Fails if `name` collides with a global sink or one already on the scope.
    pub fn register_scoped(
        &self,
        scope: &Scope,
        name: impl Into<String>,
        sink: Arc<dyn Sink>,
    ) -> Result<Scope, ConfigurationError> {
        let name = name.into();
        let _guard = self.registration.lock();

        let global_hit = self.table.load().sinks.iter().any(|s| s.name == name);
        if global_hit || scope.has_local_sink(&name) {
            return Err(ConfigurationError::DuplicateSink(name));
        }
        Ok(scope.with_sink(name, sink))
    }

    /// Deliver `payload` to every global sink, then to the scope's local sinks.
    ///
    /// A sink that errors or panics is skipped; the failure is reported to the
    /// baseline sink only and delivery continues with the remaining sinks.
    pub fn dispatch(&self, scope: &Scope, payload: &Payload) -> DispatchOutcome {
        let table = self.table.load();
        let silenced = self.baseline_silenced.load(Ordering::Relaxed);
        let mut outcome = DispatchOutcome::default();

        let globals = table
            .sinks
            .iter()
            .filter(|s| !(silenced && s.name == BASELINE_SINK))
            .map(|s| (s.name.as_str(), &s.sink));
        let locals = scope.local_sinks();
        let locals = locals.iter().map(|(name, sink)| (name.as_str(), sink));

        for (name, sink) in globals.chain(locals) {
            match deliver(name, sink.as_ref(), payload) {
                Ok(()) => outcome.delivered += 1,
                Err(err) => {
                    self.report_failure(scope, &err);
                    outcome.failed.push(err);
                }
            }
        }
        outcome
    }

    /// Mute the baseline sink for ordinary payloads. Failure reports still reach it.
    pub fn silence(&self, silenced: bool) {
        self.baseline_silenced.store(silenced, Ordering::Relaxed);
    }

    pub fn is_silenced(&self) -> bool {
        self.baseline_silenced.load(Ordering::Relaxed)
    }

    /// Version of the published global table; bumps on every registration.
    pub fn version(&self) -> u64 {
        self.table.load().version
    }

    /// Global sink names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.table.load().sinks.iter().map(|s| s.name.clone()).collect()
    }

    fn report_failure(&self, scope: &Scope, err: &SinkDispatchError) {
        if err.sink == BASELINE_SINK {
            tracing::error!(sink = %err.sink, reason = %err.reason, "Baseline sink failed");
            return;
        }

        let report = Payload::Log(LogRecord {
            level: Level::Error,
            timestamp: Utc::now(),
            location: None,
            message: err.to_string(),
            span_id: scope.span_id(),
            depth: scope.depth(),
            tags: scope
                .with_all([Tag::new("sink.name", err.sink.as_str())])
                .snapshot(),
        });
        if let Err(nested) = deliver(BASELINE_SINK, self.baseline.as_ref(), &report) {
            tracing::error!(
                sink = %err.sink,
                reason = %err.reason,
                baseline_error = %nested.reason,
                "Could not report sink failure"
            );
        }
    }
}

fn deliver(name: &str, sink: &dyn Sink, payload: &Payload) -> Result<(), SinkDispatchError> {
    let result = catch_unwind(AssertUnwindSafe(|| sink.emit(payload)));
    let reason = match result {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(err)) => err.to_string(),
        Err(panic) => panic_message(panic.as_ref()),
    };
    Err(SinkDispatchError {
        sink: name.to_string(),
        reason,
    })
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

impl std::fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkRegistry")
            .field("version", &self.version())
            .field("sinks", &self.names())
            .field("silenced", &self.is_silenced())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn registry() -> (SinkRegistry, Arc<MemorySink>) {
        let baseline = Arc::new(MemorySink::new());
        (SinkRegistry::new(baseline.clone()), baseline)
    }

    fn info(message: &str) -> Payload {
        Payload::Log(LogRecord {
            level: Level::Info,
            timestamp: Utc::now(),
            location: None,
            message: message.into(),
            span_id: None,
            depth: 0,
            tags: Scope::root().snapshot(),
        })
    }

    #[test]
    fn test_baseline_present_at_start() {
        let (registry, _) = registry();
        assert_eq!(registry.names(), vec![BASELINE_SINK.to_string()]);
        assert_eq!(registry.version(), 1);
    }

    #[test]
    fn test_baseline_name_cannot_be_reused() {
        let (registry, _) = registry();
        let err = registry
            .register_global(BASELINE_SINK, Arc::new(MemorySink::new()))
            .unwrap_err();
        assert_eq!(err, ConfigurationError::DuplicateSink(BASELINE_SINK.into()));
        assert_eq!(registry.version(), 1);
    }

    #[test]
    fn test_silence_skips_baseline() {
        let (registry, baseline) = registry();
        registry.silence(true);
        let outcome = registry.dispatch(&Scope::root(), &info("quiet"));
        assert_eq!(outcome.delivered, 0);
        assert!(baseline.is_empty());

        registry.silence(false);
        registry.dispatch(&Scope::root(), &info("loud"));
        assert_eq!(baseline.len(), 1);
    }

    #[test]
    fn test_panic_message_extraction() {
        let err = deliver(
            "boom",
            &crate::sink::sink_fn(|_| panic!("exploded")),
            &info("x"),
        )
        .unwrap_err();
        assert_eq!(err.sink, "boom");
        assert!(err.reason.contains("exploded"));
    }
}
