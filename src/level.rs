//! Severity levels attached to every payload.

use serde::{Serialize, Serializer};

/// Severity of an emitted payload.
///
/// TRACE and DEBUG payloads are gated by [`Verbosity`](crate::Verbosity); every
/// other level is always dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Extremely fine-grained logs.
    Trace,
    /// Logs that help fix potential issues, but are too verbose by default.
    Debug,
    /// Logs emitted by default.
    Info,
    /// A non-critical issue.
    Warn,
    /// An issue that stops the current unit of work but not the process.
    Error,
    /// A critical error that must stop the process.
    Fatal,
    /// A materialized counter or gauge value.
    Metric,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
            Self::Metric => "METRIC",
        }
    }

    /// Three-letter console name.
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Trace => "TRA",
            Self::Debug => "DBG",
            Self::Info => "INF",
            Self::Warn => "WRN",
            Self::Error => "ERR",
            Self::Fatal => "FTL",
            Self::Metric => "MET",
        }
    }

    /// Returns true for the levels that need a runtime toggle to be visible.
    pub fn is_verbose(&self) -> bool {
        matches!(self, Self::Trace | Self::Debug)
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
