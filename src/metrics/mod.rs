//! Process metrics: counters, gauges and windowed histograms.
//!
//! Values accumulate in concurrent maps and are materialized into
//! [`MetricRecord`]s by [`MetricsRegistry::collect`], which the owning
//! [`Telemetry`](crate::Telemetry) calls on every flush.

mod histogram;

pub use histogram::{Histogram, WINDOW_BUCKETS};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::ConfigurationError;
use crate::scope::Scope;
use crate::sink::{MetricRecord, MetricValue};

/// Gauge emitted at the end of every flush with the number of metrics emitted before it.
pub const METRICS_EMITTED_GAUGE: &str = "instrument.metrics.emitted";

/// Quantile gauges registered for every histogram, as `(suffix, quantile)`.
pub const QUANTILES: [(&str, f64); 6] = [
    ("p50", 0.50),
    ("p75", 0.75),
    ("p90", 0.90),
    ("p95", 0.95),
    ("p99", 0.99),
    ("p999", 0.999),
];

/// Highest significant-figure count a histogram accepts.
const MAX_SIGNIFICANT_FIGURES: u8 = 5;

type Accessor = Arc<dyn Fn() -> i64 + Send + Sync>;
type GroupInit = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
enum GaugeSource {
    Constant(i64),
    Deferred(Accessor),
}

impl GaugeSource {
    fn read(&self) -> i64 {
        match self {
            Self::Constant(v) => *v,
            Self::Deferred(f) => f(),
        }
    }
}

/// Concurrent store of counters, gauges and histograms.
#[derive(Default)]
pub struct MetricsRegistry {
    counters: DashMap<String, AtomicU64>,
    gauges: DashMap<String, GaugeSource>,
    group_inits: DashMap<String, GroupInit>,
    histograms: DashMap<String, Arc<Histogram>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` to counter `name`, creating it at `delta` if absent.
    pub fn counter_add(&self, name: &str, delta: u64) {
        if let Some(counter) = self.counters.get(name) {
            counter.fetch_add(delta, Ordering::Relaxed);
            return;
        }
        self.counters
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(delta, Ordering::Relaxed);
    }

    pub fn counter_value(&self, name: &str) -> Option<u64> {
        self.counters.get(name).map(|c| c.load(Ordering::Relaxed))
    }

    /// Set gauge `name` to a constant.
    pub fn gauge_set(&self, name: &str, value: i64) {
        self.gauges.insert(name.to_string(), GaugeSource::Constant(value));
    }

    /// Set gauge `name` to a value computed on every flush.
    ///
    /// `init` is stored once per `group_key` and runs once per flush before
    /// any gauge is read, so related gauges can share one expensive step.
    pub fn gauge_set_deferred<F, I>(&self, name: &str, accessor: F, group_key: &str, init: I)
    where
        F: Fn() -> i64 + Send + Sync + 'static,
        I: Fn() + Send + Sync + 'static,
    {
        self.gauges
            .insert(name.to_string(), GaugeSource::Deferred(Arc::new(accessor)));
        self.group_inits
            .entry(group_key.to_string())
            .or_insert_with(|| Arc::new(init));
    }

    /// Current reading of gauge `name`. Deferred gauges are evaluated now.
    pub fn gauge_value(&self, name: &str) -> Option<i64> {
        let source = self.gauges.get(name).map(|g| g.value().clone())?;
        Some(source.read())
    }

    /// Define a windowed histogram and its six quantile gauges.
    ///
    /// Fails if `name` is taken or the bounds are unusable: `min` must be
    /// non-negative, `max` at least twice `max(min, 1)`, and
    /// `significant_figures` between 1 and 5.
    pub fn new_histogram(
        &self,
        name: &str,
        min: i64,
        max: i64,
        significant_figures: u8,
    ) -> Result<Arc<Histogram>, ConfigurationError> {
        validate_histogram(name, min, max, significant_figures)?;

        let histogram = match self.histograms.entry(name.to_string()) {
            Entry::Occupied(_) => {
                return Err(ConfigurationError::DuplicateHistogram(name.to_string()))
            }
            Entry::Vacant(slot) => {
                let histogram = Histogram::new(name.to_string(), min, max, significant_figures)
                    .map_err(|e| ConfigurationError::InvalidHistogram {
                        name: name.to_string(),
                        reason: e.to_string(),
                    })?;
                let histogram = Arc::new(histogram);
                slot.insert(histogram.clone());
                histogram
            }
        };

        for (suffix, quantile) in QUANTILES {
            let reader = Arc::downgrade(&histogram);
            let merger = Arc::downgrade(&histogram);
            self.gauge_set_deferred(
                &format!("{}.{}", name, suffix),
                move || reader.upgrade().map_or(0, |h| h.value_at_quantile(quantile)),
                name,
                move || {
                    if let Some(h) = merger.upgrade() {
                        h.merge();
                    }
                },
            );
        }

        tracing::debug!(histogram = %name, min, max, significant_figures, "Registered histogram");
        Ok(histogram)
    }

    pub fn histogram(&self, name: &str) -> Option<Arc<Histogram>> {
        self.histograms.get(name).map(|h| h.value().clone())
    }

    /// Advance every histogram's window by one bucket.
    pub fn rotate_all(&self) {
        for histogram in self.histogram_handles() {
            histogram.rotate();
        }
    }

    /// Run group inits, then read every counter and gauge.
    ///
    /// Counters come first, then gauges, each sorted by name, then the
    /// [`METRICS_EMITTED_GAUGE`] count. Map shards are released before any
    /// user callback runs.
    pub fn collect(&self, scope: &Scope) -> Vec<MetricRecord> {
        let inits: Vec<GroupInit> = self.group_inits.iter().map(|e| e.value().clone()).collect();
        for init in inits {
            init();
        }

        let mut counters: Vec<(String, u64)> = self
            .counters
            .iter()
            .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
            .collect();
        counters.sort_by(|a, b| a.0.cmp(&b.0));

        let mut gauges: Vec<(String, GaugeSource)> = self
            .gauges
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        gauges.sort_by(|a, b| a.0.cmp(&b.0));

        let timestamp = Utc::now();
        let tags = scope.snapshot();
        let record = |name: String, value: MetricValue| MetricRecord {
            name,
            value,
            timestamp,
            tags: tags.clone(),
        };

        let mut records = Vec::with_capacity(counters.len() + gauges.len() + 1);
        records.extend(
            counters
                .into_iter()
                .map(|(name, v)| record(name, MetricValue::Counter(v))),
        );
        records.extend(
            gauges
                .into_iter()
                .map(|(name, source)| record(name, MetricValue::Gauge(source.read()))),
        );
        let emitted = records.len() as i64;
        records.push(record(
            METRICS_EMITTED_GAUGE.to_string(),
            MetricValue::Gauge(emitted),
        ));
        records
    }

    fn histogram_handles(&self) -> Vec<Arc<Histogram>> {
        self.histograms.iter().map(|e| e.value().clone()).collect()
    }
}

fn validate_histogram(
    name: &str,
    min: i64,
    max: i64,
    significant_figures: u8,
) -> Result<(), ConfigurationError> {
    let invalid = |reason: String| ConfigurationError::InvalidHistogram {
        name: name.to_string(),
        reason,
    };
    if min < 0 {
        return Err(invalid(format!("min {} must not be negative", min)));
    }
    let lowest = min.max(1);
    if max < lowest.saturating_mul(2) {
        return Err(invalid(format!(
            "max {} must be at least twice {}",
            max, lowest
        )));
    }
    if !(1..=MAX_SIGNIFICANT_FIGURES).contains(&significant_figures) {
        return Err(invalid(format!(
            "significant figures {} must be between 1 and {}",
            significant_figures, MAX_SIGNIFICANT_FIGURES
        )));
    }
    Ok(())
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("counters", &self.counters.len())
            .field("gauges", &self.gauges.len())
            .field("histograms", &self.histograms.len())
            .finish()
    }
}
