//! instrument-core
//!
//! Scoped structured logging, span tracing and windowed metrics, delivered
//! through one sink fan-out.
//!
//! # Model
//!
//! - **Scope**: immutable, insertion-ordered tags plus span identity and
//!   scope-local sinks. Derivation never mutates the parent.
//! - **Sinks**: a baseline sink that always exists, further global sinks,
//!   and sinks attached to a scope lineage. A failing sink never affects the
//!   emitter or the other sinks.
//! - **Spans**: one timed record per unit of work, emitted on every exit path.
//! - **Metrics**: counters, gauges and windowed histograms, flushed and
//!   rotated by background workers.
//! - **Verbosity**: DEBUG and TRACE payloads are dropped centrally unless
//!   enabled at runtime.
//!
//! # Example
//!
//! ```no_run
//! use instrument_core::{Scope, Telemetry, TelemetryConfig};
//!
//! let telemetry = Telemetry::new(TelemetryConfig::default());
//! let scope = Scope::root().with("request.id", 42);
//! let result: Result<u32, instrument_core::TelemetryError> =
//!     telemetry.run_span(&scope, "load", |scope, attach| {
//!         attach.attach("rows", 7);
//!         telemetry.info(scope, "loading");
//!         Ok(7)
//!     });
//! assert_eq!(result.unwrap(), 7);
//! ```

pub mod config;
pub mod error;
pub mod ids;
pub mod level;
pub mod metrics;
pub mod scope;
pub mod sink;
pub mod span;
pub mod telemetry;
pub mod value;
pub mod verbosity;

mod macros;

use std::sync::{Arc, OnceLock};

pub use config::TelemetryConfig;
pub use error::{
    ConfigurationError, IdGenerationError, SinkDispatchError, SinkError, TelemetryError,
    ValueRangeError,
};
pub use ids::{IdGenerator, SpanId, TimeOrderedIds};
pub use level::Level;
pub use metrics::{Histogram, MetricsRegistry};
pub use scope::{Scope, SpanContext, INSTANCE_TAG};
pub use sink::{
    sink_fn, DispatchOutcome, Location, MemorySink, MetricsFacadeSink, Payload, Sink,
    SinkRegistry, TracingSink,
};
pub use span::{ActiveSpan, Attachments};
pub use telemetry::{FlushReport, Telemetry, TelemetryBuilder, TelemetryGuard};
pub use value::{Tag, TagValue};
pub use verbosity::Verbosity;

static GLOBAL: OnceLock<Arc<Telemetry>> = OnceLock::new();

/// The default instance, created from environment configuration on first use.
pub fn global() -> &'static Arc<Telemetry> {
    GLOBAL.get_or_init(|| Arc::new(Telemetry::new(config::load())))
}

/// Install the default instance explicitly. Fails if one already exists.
pub fn init(config: TelemetryConfig) -> Result<&'static Arc<Telemetry>, ConfigurationError> {
    GLOBAL
        .set(Arc::new(Telemetry::new(config)))
        .map_err(|_| ConfigurationError::AlreadyInitialized)?;
    Ok(global())
}

/// Register a global sink on the default instance.
///
/// A name collision is fatal: it is logged at FATAL and the process exits.
#[track_caller]
pub fn use_sink(name: impl Into<String>, sink: Arc<dyn Sink>) {
    let telemetry = global();
    if let Err(e) = telemetry.use_sink(name, sink) {
        telemetry.fatal(&Scope::root(), e.to_string());
    }
}
