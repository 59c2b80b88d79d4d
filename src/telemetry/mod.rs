//! The telemetry registry object.
//!
//! A [`Telemetry`] owns one sink registry, one metrics registry and one
//! verbosity gate. Every emission entry point assembles a payload from a
//! [`Scope`] and hands it to the sink registry. Instances are independent, so
//! tests build their own while applications use [`crate::global`].

mod logging;
mod workers;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use workers::TelemetryGuard;

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::config::TelemetryConfig;
use crate::error::ConfigurationError;
use crate::ids::{IdGenerator, TimeOrderedIds};
use crate::level::Level;
use crate::metrics::MetricsRegistry;
use crate::scope::Scope;
use crate::sink::{
    DispatchOutcome, EventRecord, Location, LogRecord, Payload, Sink, SinkRegistry, TracingSink,
};
use crate::value::Tag;
use crate::verbosity::Verbosity;

/// Outcome of one metrics flush.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    /// Metric payloads dispatched, including the emitted-count gauge.
    pub metrics: usize,
    /// Sink failures observed while dispatching them.
    pub sink_failures: usize,
}

pub struct Telemetry {
    pub(crate) sinks: SinkRegistry,
    pub(crate) metrics: Arc<MetricsRegistry>,
    pub(crate) verbosity: Arc<Verbosity>,
    pub(crate) ids: Arc<dyn IdGenerator>,
    config: TelemetryConfig,
}

impl Telemetry {
    /// An instance with the default baseline sink and id generator.
    pub fn new(config: TelemetryConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> TelemetryBuilder {
        TelemetryBuilder::default()
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn sinks(&self) -> &SinkRegistry {
        &self.sinks
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn verbosity(&self) -> &Verbosity {
        &self.verbosity
    }

    /// Register a process-wide sink.
    pub fn use_sink(
        &self,
        name: impl Into<String>,
        sink: Arc<dyn Sink>,
    ) -> Result<(), ConfigurationError> {
        self.sinks.register_global(name, sink)
    }

    /// Derive a scope that also delivers to `sink`.
    pub fn with_sink(
        &self,
        scope: &Scope,
        name: impl Into<String>,
        sink: Arc<dyn Sink>,
    ) -> Result<Scope, ConfigurationError> {
        self.sinks.register_scoped(scope, name, sink)
    }

    /// Mute or unmute the baseline sink.
    pub fn silence(&self, silenced: bool) {
        self.sinks.silence(silenced);
    }

    /// Whether a payload at `level` would currently be emitted.
    pub fn enabled(&self, level: Level) -> bool {
        self.verbosity.allows(level)
    }

    /// Gate on verbosity, then fan out.
    pub fn dispatch(&self, scope: &Scope, payload: Payload) -> DispatchOutcome {
        if !self.verbosity.allows(payload.level()) {
            return DispatchOutcome::default();
        }
        self.sinks.dispatch(scope, &payload)
    }

    /// Emit a log line at `level`, tagged with the scope and current span.
    #[track_caller]
    pub fn log(&self, scope: &Scope, level: Level, message: impl Into<String>) {
        let location = Location::from(std::panic::Location::caller());
        self.log_at(scope, level, location, message);
    }

    #[track_caller]
    pub fn trace(&self, scope: &Scope, message: impl Into<String>) {
        self.log(scope, Level::Trace, message);
    }

    #[track_caller]
    pub fn debug(&self, scope: &Scope, message: impl Into<String>) {
        self.log(scope, Level::Debug, message);
    }

    #[track_caller]
    pub fn info(&self, scope: &Scope, message: impl Into<String>) {
        self.log(scope, Level::Info, message);
    }

    #[track_caller]
    pub fn warn(&self, scope: &Scope, message: impl Into<String>) {
        self.log(scope, Level::Warn, message);
    }

    #[track_caller]
    pub fn error(&self, scope: &Scope, message: impl Into<String>) {
        self.log(scope, Level::Error, message);
    }

    /// Emit a FATAL log, flush metrics and exit with status 1.
    #[track_caller]
    pub fn fatal(&self, scope: &Scope, message: impl Into<String>) -> ! {
        self.log(scope, Level::Fatal, message);
        self.flush();
        std::process::exit(1)
    }

    /// Log with an explicit location. Used by the crate-level macros.
    #[doc(hidden)]
    pub fn log_at(&self, scope: &Scope, level: Level, location: Location, message: impl Into<String>) {
        if !self.verbosity.allows(level) {
            return;
        }
        let record = LogRecord {
            level,
            timestamp: Utc::now(),
            location: Some(location),
            message: message.into(),
            span_id: scope.span_id(),
            depth: scope.depth(),
            tags: scope.snapshot(),
        };
        self.sinks.dispatch(scope, &Payload::Log(record));
    }

    /// Emit a named event with its own id. Returns the id, nil if allocation failed.
    #[track_caller]
    pub fn post_event<T, I>(&self, scope: &Scope, name: &str, tags: I) -> Uuid
    where
        T: Into<Tag>,
        I: IntoIterator<Item = T>,
    {
        let id = match self.ids.next_id() {
            Ok(id) => id,
            Err(e) => {
                self.log(scope, Level::Error, format!("Could not post event '{}': {}", name, e));
                Uuid::nil()
            }
        };
        let record = EventRecord {
            id,
            name: name.to_string(),
            span_id: scope.span_id(),
            timestamp: Utc::now(),
            tags: scope.with_all(tags).snapshot(),
        };
        self.dispatch(scope, Payload::Event(record));
        id
    }

    /// Materialize every counter and gauge and dispatch them.
    pub fn flush(&self) -> FlushReport {
        let scope = Scope::root();
        let mut report = FlushReport::default();
        for record in self.metrics.collect(&scope) {
            let outcome = self.dispatch(&scope, Payload::Metric(record));
            report.metrics += 1;
            report.sink_failures += outcome.failed.len();
        }
        report
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new(TelemetryConfig::default())
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("sinks", &self.sinks)
            .field("metrics", &self.metrics)
            .field("verbosity", &self.verbosity)
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for [`Telemetry`].
#[derive(Default)]
pub struct TelemetryBuilder {
    baseline: Option<Arc<dyn Sink>>,
    ids: Option<Arc<dyn IdGenerator>>,
    config: TelemetryConfig,
}

impl TelemetryBuilder {
    /// Replace the default [`TracingSink`] baseline.
    pub fn baseline(mut self, sink: Arc<dyn Sink>) -> Self {
        self.baseline = Some(sink);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn config(mut self, config: TelemetryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Telemetry {
        let baseline = self
            .baseline
            .unwrap_or_else(|| Arc::new(TracingSink::new()));
        let sinks = SinkRegistry::new(baseline);
        sinks.silence(self.config.silent);

        Telemetry {
            sinks,
            metrics: Arc::new(MetricsRegistry::new()),
            verbosity: Arc::new(Verbosity::new(self.config.debug, self.config.trace)),
            ids: self.ids.unwrap_or_else(|| Arc::new(TimeOrderedIds)),
            config: self.config,
        }
    }
}
