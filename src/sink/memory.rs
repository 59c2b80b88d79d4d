//! In-memory capture sink.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::error::SinkError;

use super::payload::{EventRecord, LogRecord, MetricRecord, MetricValue, Payload, SpanRecord};
use super::Sink;

const DEFAULT_CAPACITY: usize = 10_000;

/// Bounded buffer of emitted payloads. The oldest payload is dropped once full.
#[derive(Debug)]
pub struct MemorySink {
    payloads: Mutex<VecDeque<Payload>>,
    capacity: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            payloads: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Copy of everything captured so far, oldest first.
    pub fn payloads(&self) -> Vec<Payload> {
        self.payloads.lock().iter().cloned().collect()
    }

    pub fn logs(&self) -> Vec<LogRecord> {
        self.collect(|p| match p {
            Payload::Log(r) => Some(r.clone()),
            _ => None,
        })
    }

    pub fn spans(&self) -> Vec<SpanRecord> {
        self.collect(|p| match p {
            Payload::Span(r) => Some(r.clone()),
            _ => None,
        })
    }

    pub fn metrics(&self) -> Vec<MetricRecord> {
        self.collect(|p| match p {
            Payload::Metric(r) => Some(r.clone()),
            _ => None,
        })
    }

    pub fn events(&self) -> Vec<EventRecord> {
        self.collect(|p| match p {
            Payload::Event(r) => Some(r.clone()),
            _ => None,
        })
    }

    /// Most recent value captured for metric `name`.
    pub fn metric(&self, name: &str) -> Option<MetricValue> {
        self.payloads.lock().iter().rev().find_map(|p| match p {
            Payload::Metric(r) if r.name == name => Some(r.value),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.payloads.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.lock().is_empty()
    }

    pub fn clear(&self) {
        self.payloads.lock().clear();
    }

    fn collect<T>(&self, pick: impl Fn(&Payload) -> Option<T>) -> Vec<T> {
        self.payloads.lock().iter().filter_map(pick).collect()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for MemorySink {
    fn emit(&self, payload: &Payload) -> Result<(), SinkError> {
        let mut payloads = self.payloads.lock();
        if payloads.len() >= self.capacity {
            payloads.pop_front();
        }
        payloads.push_back(payload.clone());
        Ok(())
    }
}
