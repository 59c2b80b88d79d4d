//! Baseline sink forwarding payloads to the `tracing` subscriber.

use crate::error::SinkError;
use crate::level::Level;
use crate::value::TagMap;

use super::payload::{MetricValue, Payload};
use super::Sink;

/// `tracing` requires a constant level per callsite, so each level gets its own.
macro_rules! forward {
    ($level:expr, $($fields:tt)+) => {
        match $level {
            Level::Trace => tracing::trace!(target: "instrument", $($fields)+),
            Level::Debug => tracing::debug!(target: "instrument", $($fields)+),
            Level::Info | Level::Metric => tracing::info!(target: "instrument", $($fields)+),
            Level::Warn => tracing::warn!(target: "instrument", $($fields)+),
            Level::Error | Level::Fatal => tracing::error!(target: "instrument", $($fields)+),
        }
    };
}

/// Default always-present sink.
///
/// Every payload becomes one `tracing` event under the `instrument` target.
/// Scope tags travel as a single JSON-encoded `tags` field; presentation is
/// left to whatever subscriber the host installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

impl Sink for TracingSink {
    fn emit(&self, payload: &Payload) -> Result<(), SinkError> {
        let tags = serde_json::to_string(&TagMap(payload.tags()))?;
        let level = payload.level();

        match payload {
            Payload::Log(r) => {
                let file = r.location.map(|l| l.file).unwrap_or_default();
                let line = r.location.map(|l| l.line).unwrap_or_default();
                let span_id = r.span_id.map(|id| id.to_string()).unwrap_or_default();
                forward!(
                    level,
                    severity = level.as_str(),
                    file,
                    line,
                    span_id = %span_id,
                    depth = r.depth,
                    tags = %tags,
                    "{}",
                    r.message
                );
            }
            Payload::Span(r) => {
                let parent_id = r.parent_id.map(|id| id.to_string()).unwrap_or_default();
                forward!(
                    level,
                    severity = level.as_str(),
                    span_id = %r.id,
                    parent_id = %parent_id,
                    depth = r.depth,
                    duration_us = u64::try_from(r.duration.as_micros()).unwrap_or(u64::MAX),
                    error = r.error.as_deref(),
                    tags = %tags,
                    "span {}",
                    r.name
                );
            }
            Payload::Metric(r) => {
                let value = match r.value {
                    MetricValue::Counter(v) => i128::from(v),
                    MetricValue::Gauge(v) => i128::from(v),
                };
                forward!(
                    level,
                    severity = level.as_str(),
                    metric = %r.name,
                    value = %value,
                    tags = %tags,
                    "metric {}",
                    r.name
                );
            }
            Payload::Event(r) => {
                let span_id = r.span_id.map(|id| id.to_string()).unwrap_or_default();
                forward!(
                    level,
                    severity = level.as_str(),
                    event_id = %r.id,
                    span_id = %span_id,
                    tags = %tags,
                    "event {}",
                    r.name
                );
            }
        }
        Ok(())
    }
}
