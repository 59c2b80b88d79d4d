//! Payload records handed to sinks.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::ids::SpanId;
use crate::level::Level;
use crate::scope::INSTANCE_TAG;
use crate::value::{Tag, TagMap, TagValue};

/// Keys used by [`Payload::to_fields`].
pub mod keys {
    pub const LEVEL: &str = "meta.level";
    pub const FILE: &str = "meta.file";
    pub const LINE: &str = "meta.line";
    pub const MESSAGE: &str = "log.message";
    pub const TRACE_ID: &str = "trace.id";
    pub const TRACE_PARENT: &str = "trace.parent";
    pub const TRACE_NAME: &str = "trace.name";
    pub const TRACE_DEPTH: &str = "trace.depth";
    pub const TRACE_START: &str = "trace.start";
    pub const TRACE_DURATION: &str = "trace.duration";
    pub const TRACE_ERROR: &str = "trace.error";
    pub const METRIC_NAME: &str = "metric.name";
    pub const METRIC_VALUE: &str = "metric.value";
    pub const EVENT_ID: &str = "event.id";
    pub const EVENT_NAME: &str = "event.name";
    pub const EVENT_TRACE_ID: &str = "event.trace.id";
}

/// Source location of an emission call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl From<&'static std::panic::Location<'static>> for Location {
    fn from(loc: &'static std::panic::Location<'static>) -> Self {
        Self {
            file: loc.file(),
            line: loc.line(),
            column: loc.column(),
        }
    }
}

/// A log line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: Level,
    pub timestamp: DateTime<Utc>,
    pub location: Option<Location>,
    pub message: String,
    /// Span the log was emitted in.
    pub span_id: Option<SpanId>,
    pub depth: u32,
    pub tags: Vec<Tag>,
}

/// A finished span.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanRecord {
    pub id: SpanId,
    pub parent_id: Option<SpanId>,
    pub name: String,
    pub depth: u32,
    pub start: DateTime<Utc>,
    pub duration: Duration,
    pub error: Option<String>,
    pub location: Option<Location>,
    pub tags: Vec<Tag>,
}

impl SpanRecord {
    pub fn level(&self) -> Level {
        if self.error.is_some() {
            Level::Error
        } else {
            Level::Info
        }
    }
}

/// Materialized value of a counter or gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricValue {
    Counter(u64),
    Gauge(i64),
}

impl From<MetricValue> for TagValue {
    fn from(v: MetricValue) -> Self {
        match v {
            MetricValue::Counter(c) => TagValue::UInt(c),
            MetricValue::Gauge(g) => TagValue::Int(g),
        }
    }
}

/// One counter or gauge reading produced by a flush.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub name: String,
    pub value: MetricValue,
    pub timestamp: DateTime<Utc>,
    pub tags: Vec<Tag>,
}

/// A named application event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// Nil when id allocation failed.
    pub id: Uuid,
    pub name: String,
    pub span_id: Option<SpanId>,
    pub timestamp: DateTime<Utc>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Log,
    Span,
    Metric,
    Event,
}

/// Everything a sink can receive.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Log(LogRecord),
    Span(SpanRecord),
    Metric(MetricRecord),
    Event(EventRecord),
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::Log(_) => PayloadKind::Log,
            Self::Span(_) => PayloadKind::Span,
            Self::Metric(_) => PayloadKind::Metric,
            Self::Event(_) => PayloadKind::Event,
        }
    }

    pub fn level(&self) -> Level {
        match self {
            Self::Log(r) => r.level,
            Self::Span(r) => r.level(),
            Self::Metric(_) => Level::Metric,
            Self::Event(_) => Level::Info,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Log(r) => r.timestamp,
            Self::Span(r) => r.start,
            Self::Metric(r) => r.timestamp,
            Self::Event(r) => r.timestamp,
        }
    }

    /// Scope tags captured at emission, ending with the instance sentinel.
    pub fn tags(&self) -> &[Tag] {
        match self {
            Self::Log(r) => &r.tags,
            Self::Span(r) => &r.tags,
            Self::Metric(r) => &r.tags,
            Self::Event(r) => &r.tags,
        }
    }

    /// Flat key/value view: scope tags, then built-in fields, then `meta.instance`.
    ///
    /// Built-in fields win over scope tags with the same key.
    pub fn to_fields(&self) -> Vec<Tag> {
        let mut builtins = vec![Tag::new(keys::LEVEL, self.level())];
        match self {
            Self::Log(r) => {
                if let Some(loc) = r.location {
                    builtins.push(Tag::new(keys::FILE, loc.file));
                    builtins.push(Tag::new(keys::LINE, loc.line));
                }
                if let Some(id) = r.span_id {
                    builtins.push(Tag::new(keys::TRACE_PARENT, id));
                }
                builtins.push(Tag::new(keys::MESSAGE, r.message.as_str()));
            }
            Self::Span(r) => {
                builtins.push(Tag::new(keys::TRACE_ID, r.id));
                if let Some(parent) = r.parent_id {
                    builtins.push(Tag::new(keys::TRACE_PARENT, parent));
                }
                builtins.push(Tag::new(keys::TRACE_NAME, r.name.as_str()));
                builtins.push(Tag::new(keys::TRACE_DEPTH, r.depth));
                builtins.push(Tag::new(keys::TRACE_START, r.start));
                builtins.push(Tag::new(keys::TRACE_DURATION, r.duration));
                if let Some(err) = &r.error {
                    builtins.push(Tag::new(keys::TRACE_ERROR, TagValue::Error(err.clone())));
                }
                if let Some(loc) = r.location {
                    builtins.push(Tag::new(keys::FILE, loc.file));
                    builtins.push(Tag::new(keys::LINE, loc.line));
                }
            }
            Self::Metric(r) => {
                builtins.push(Tag::new(keys::METRIC_NAME, r.name.as_str()));
                builtins.push(Tag::new(keys::METRIC_VALUE, r.value));
            }
            Self::Event(r) => {
                builtins.push(Tag::new(keys::EVENT_ID, r.id));
                if let Some(id) = r.span_id {
                    builtins.push(Tag::new(keys::EVENT_TRACE_ID, id));
                }
                builtins.push(Tag::new(keys::EVENT_NAME, r.name.as_str()));
            }
        }

        let mut fields: Vec<Tag> = self
            .tags()
            .iter()
            .filter(|t| t.key != INSTANCE_TAG && !builtins.iter().any(|b| b.key == t.key))
            .cloned()
            .collect();
        fields.extend(builtins);
        if let Some(instance) = self.tags().iter().find(|t| t.key == INSTANCE_TAG) {
            fields.push(instance.clone());
        }
        fields
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TagMap(&self.to_fields()).serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;

    fn sample_log() -> Payload {
        Payload::Log(LogRecord {
            level: Level::Warn,
            timestamp: Utc::now(),
            location: Some(Location { file: "src/app.rs", line: 12, column: 5 }),
            message: "disk almost full".into(),
            span_id: None,
            depth: 0,
            tags: Scope::root().with("host", "db-1").with(keys::MESSAGE, "spoof").snapshot(),
        })
    }

    #[test]
    fn test_fields_order_tags_builtins_instance() {
        let fields = sample_log().to_fields();
        let names: Vec<&str> = fields.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(
            names,
            vec!["host", keys::LEVEL, keys::FILE, keys::LINE, keys::MESSAGE, INSTANCE_TAG]
        );
    }

    #[test]
    fn test_builtins_override_scope_tags() {
        let fields = sample_log().to_fields();
        let message = fields.iter().find(|t| t.key == keys::MESSAGE).unwrap();
        assert_eq!(message.value, TagValue::from("disk almost full"));
    }

    #[test]
    fn test_payload_serializes_as_flat_object() {
        let json = serde_json::to_value(sample_log()).unwrap();
        assert_eq!(json["meta.level"], "WARN");
        assert_eq!(json["meta.line"], 12);
        assert_eq!(json["host"], "db-1");
    }

    #[test]
    fn test_span_level_follows_error() {
        let mut record = SpanRecord {
            id: SpanId::from(Uuid::nil()),
            parent_id: None,
            name: "load".into(),
            depth: 1,
            start: Utc::now(),
            duration: Duration::from_millis(3),
            error: None,
            location: None,
            tags: Vec::new(),
        };
        assert_eq!(record.level(), Level::Info);
        record.error = Some("boom".into());
        assert_eq!(Payload::Span(record).level(), Level::Error);
    }
}
