//! Bridge into the `metrics` crate facade.
//!
//! Flushed counters and gauges are mirrored into whichever recorder the host
//! installed; span durations are recorded as a histogram labelled by span name.
//! Without an installed recorder every call is a no-op.

use crate::error::SinkError;

use super::payload::{MetricValue, Payload};
use super::Sink;

/// Histogram receiving span durations, in seconds.
pub const SPAN_DURATION_HISTOGRAM: &str = "instrument.span.duration";

#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsFacadeSink;

impl MetricsFacadeSink {
    pub fn new() -> Self {
        Self
    }
}

impl Sink for MetricsFacadeSink {
    fn emit(&self, payload: &Payload) -> Result<(), SinkError> {
        match payload {
            Payload::Metric(record) => match record.value {
                // Flushes carry the running total, not a delta.
                MetricValue::Counter(v) => metrics::counter!(record.name.clone()).absolute(v),
                MetricValue::Gauge(v) => metrics::gauge!(record.name.clone()).set(v as f64),
            },
            Payload::Span(record) => {
                metrics::histogram!(SPAN_DURATION_HISTOGRAM, "span" => record.name.clone())
                    .record(record.duration.as_secs_f64());
            }
            Payload::Log(_) | Payload::Event(_) => {}
        }
        Ok(())
    }
}
