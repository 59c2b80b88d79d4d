//! Windowed histogram.

use hdrhistogram::{CreationError, Histogram as HdrHistogram};
use parking_lot::RwLock;

use crate::error::ValueRangeError;

/// Number of rotation buckets kept; older data ages out.
pub const WINDOW_BUCKETS: usize = 5;

struct Window {
    buckets: Vec<HdrHistogram<u64>>,
    current: usize,
    /// Result of the last merge. `None` until the first flush.
    merged: Option<HdrHistogram<u64>>,
}

/// Distribution of a value stream over the last [`WINDOW_BUCKETS`] rotation intervals.
///
/// Recording, rotation and merging serialize on one lock per histogram.
/// Quantile reads share it and see the most recent merge.
pub struct Histogram {
    name: String,
    min: i64,
    max: i64,
    significant_figures: u8,
    window: RwLock<Window>,
}

impl Histogram {
    /// Bounds are validated by the registry before construction.
    ///
    /// The buckets always track from 1 so the relative error holds across the
    /// whole of `[min, max]`; `min` only bounds what `record_value` accepts.
    pub(crate) fn new(
        name: String,
        min: i64,
        max: i64,
        significant_figures: u8,
    ) -> Result<Self, CreationError> {
        let highest = max.max(2) as u64;
        let template = HdrHistogram::<u64>::new_with_bounds(1, highest, significant_figures)?;
        let buckets = (0..WINDOW_BUCKETS)
            .map(|_| HdrHistogram::new_from(&template))
            .collect();
        Ok(Self {
            name,
            min,
            max,
            significant_figures,
            window: RwLock::new(Window {
                buckets,
                current: 0,
                merged: None,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bounds(&self) -> (i64, i64) {
        (self.min, self.max)
    }

    pub fn significant_figures(&self) -> u8 {
        self.significant_figures
    }

    /// Record one value into the current bucket.
    pub fn record_value(&self, value: i64) -> Result<(), ValueRangeError> {
        let out_of_range = || ValueRangeError {
            histogram: self.name.clone(),
            value,
            min: self.min,
            max: self.max,
        };
        if value < self.min || value > self.max {
            return Err(out_of_range());
        }

        let mut window = self.window.write();
        let current = window.current;
        window.buckets[current]
            .record(value as u64)
            .map_err(|_| out_of_range())
    }

    /// Advance the window, discarding the oldest bucket.
    pub fn rotate(&self) {
        let mut window = self.window.write();
        window.current = (window.current + 1) % WINDOW_BUCKETS;
        let current = window.current;
        window.buckets[current].reset();
    }

    /// Combine every bucket into the snapshot that quantile reads use.
    pub fn merge(&self) {
        let mut guard = self.window.write();
        let window = &mut *guard;
        let merged = window
            .merged
            .get_or_insert_with(|| HdrHistogram::new_from(&window.buckets[0]));
        merged.reset();
        for bucket in &window.buckets {
            // Every bucket shares the merged histogram's bounds.
            if let Err(e) = merged.add(bucket) {
                tracing::warn!(histogram = %self.name, error = ?e, "Histogram bucket merge failed");
            }
        }
    }

    /// Quantile (0.0 to 1.0) of the last merge; 0 before the first merge.
    pub fn value_at_quantile(&self, quantile: f64) -> i64 {
        let window = self.window.read();
        window
            .merged
            .as_ref()
            .map_or(0, |m| m.value_at_quantile(quantile) as i64)
    }

    /// Values currently held across the window.
    pub fn count(&self) -> u64 {
        let window = self.window.read();
        window.buckets.iter().map(HdrHistogram::len).sum()
    }
}

impl std::fmt::Debug for Histogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Histogram")
            .field("name", &self.name)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("significant_figures", &self.significant_figures)
            .finish()
    }
}
