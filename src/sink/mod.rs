//! Pluggable payload consumers and the registry that fans payloads out to them.

mod facade;
mod memory;
mod payload;
mod registry;
mod tracing_sink;

pub use facade::{MetricsFacadeSink, SPAN_DURATION_HISTOGRAM};
pub use memory::MemorySink;
pub use payload::{
    keys, EventRecord, Location, LogRecord, MetricRecord, MetricValue, Payload, PayloadKind,
    SpanRecord,
};
pub use registry::{DispatchOutcome, SinkRegistry, BASELINE_SINK};
pub use tracing_sink::TracingSink;

use crate::error::SinkError;

/// A consumer of emitted log, span, metric and event payloads.
///
/// `emit` is called synchronously on the emitting thread. A returned error or
/// a panic is contained by the registry and never reaches the emitter.
pub trait Sink: Send + Sync {
    fn emit(&self, payload: &Payload) -> Result<(), SinkError>;
}

/// Adapts a closure into a [`Sink`].
pub struct FnSink<F>(F);

/// Wrap a closure as a sink.
pub fn sink_fn<F>(f: F) -> FnSink<F>
where
    F: Fn(&Payload) -> Result<(), SinkError> + Send + Sync,
{
    FnSink(f)
}

impl<F> Sink for FnSink<F>
where
    F: Fn(&Payload) -> Result<(), SinkError> + Send + Sync,
{
    fn emit(&self, payload: &Payload) -> Result<(), SinkError> {
        (self.0)(payload)
    }
}
