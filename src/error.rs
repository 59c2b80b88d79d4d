//! Error taxonomy for the telemetry core.
//!
//! Only configuration and id-allocation failures interrupt the caller. Range
//! errors are returned but local to one recording, and sink failures are
//! absorbed by dispatch and reported through the baseline sink.

use thiserror::Error;

/// Ambiguous or invalid registration. Callers must not continue past it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Cannot override existing '{0}' sink")]
    DuplicateSink(String),

    #[error("Histogram '{0}' already exists")]
    DuplicateHistogram(String),

    #[error("Invalid histogram '{name}': {reason}")]
    InvalidHistogram { name: String, reason: String },

    #[error("Telemetry already initialized")]
    AlreadyInitialized,
}

/// A histogram recording outside the configured bounds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{histogram}: value {value} is outside [{min}, {max}]")]
pub struct ValueRangeError {
    pub histogram: String,
    pub value: i64,
    pub min: i64,
    pub max: i64,
}

/// One sink failed while a payload was being dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Could not process sink '{sink}': {reason}")]
pub struct SinkDispatchError {
    pub sink: String,
    pub reason: String,
}

/// Unique id allocation failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdGenerationError {
    #[error("Cannot generate a new ID: system clock is before the unix epoch")]
    ClockBeforeEpoch,

    #[error("Cannot generate a new ID: {0}")]
    Exhausted(String),
}

/// Error returned by a [`Sink`](crate::Sink) implementation.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Rejected: {0}")]
    Rejected(String),
}

/// Union of the errors the public API can return.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    ValueRange(#[from] ValueRangeError),

    #[error(transparent)]
    IdGeneration(#[from] IdGenerationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display() {
        let err = ConfigurationError::DuplicateSink("terminal".into());
        assert!(err.to_string().contains("'terminal'"));
        let err = ConfigurationError::InvalidHistogram {
            name: "latency".into(),
            reason: "min must not be negative".into(),
        };
        assert!(err.to_string().contains("latency"));
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn test_value_range_error_display() {
        let err = ValueRangeError {
            histogram: "latency".into(),
            value: 500,
            min: 0,
            max: 100,
        };
        assert_eq!(err.to_string(), "latency: value 500 is outside [0, 100]");
    }

    #[test]
    fn test_telemetry_error_is_transparent() {
        let err: TelemetryError = IdGenerationError::ClockBeforeEpoch.into();
        assert!(err.to_string().contains("unix epoch"));
    }
}
