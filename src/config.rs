//! Telemetry configuration from environment variables and TOML files.
//!
//! Invalid values fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `INSTRUMENT_DEBUG` | false | Emit DEBUG payloads |
//! | `INSTRUMENT_TRACE` | false | Emit TRACE payloads (implies debug) |
//! | `INSTRUMENT_SILENT` | false | Mute the baseline sink |
//! | `INSTRUMENT_FLUSH_INTERVAL` | 60 | Metrics flush interval (secs) |
//! | `INSTRUMENT_ROTATE_INTERVAL` | 60 | Histogram rotation interval (secs) |
//! | `INSTRUMENT_SIGNALS` | true | Toggle verbosity on SIGHUP / SIGUSR1 |
//! | `INSTRUMENT_LOG_FORMAT` | json | Subscriber format: json, pretty, compact |
//! | `INSTRUMENT_LOG_LEVEL` | info | Subscriber filter directive |
//! | `INSTRUMENT_LOG_FILE` | unset | Write subscriber output to this file |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::telemetry::{LogConfig, LogFormat};

const DEFAULT_INTERVAL_SECS: u64 = 60;
const MIN_INTERVAL_SECS: u64 = 1;

/// Settings for one [`Telemetry`](crate::Telemetry) instance.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    pub debug: bool,
    pub trace: bool,
    /// Start with the baseline sink muted.
    pub silent: bool,
    pub flush_interval: Duration,
    pub rotate_interval: Duration,
    /// Install the SIGHUP / SIGUSR1 verbosity listener on start (Unix only).
    pub listen_for_signals: bool,
    pub log: LogConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            debug: false,
            trace: false,
            silent: false,
            flush_interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            rotate_interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            listen_for_signals: true,
            log: LogConfig::default(),
        }
    }
}

/// Errors from reading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    debug: Option<bool>,
    trace: Option<bool>,
    silent: Option<bool>,
    flush_interval_secs: Option<u64>,
    rotate_interval_secs: Option<u64>,
    listen_for_signals: Option<bool>,
    log: FileLogConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileLogConfig {
    format: Option<LogFormat>,
    level: Option<String>,
    file: Option<PathBuf>,
}

impl TelemetryConfig {
    /// Parse a TOML document. Absent keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(text)?;
        let mut cfg = Self::default();
        if let Some(v) = file.debug {
            cfg.debug = v;
        }
        if let Some(v) = file.trace {
            cfg.trace = v;
        }
        if let Some(v) = file.silent {
            cfg.silent = v;
        }
        if let Some(v) = file.flush_interval_secs {
            cfg.flush_interval = interval(v);
        }
        if let Some(v) = file.rotate_interval_secs {
            cfg.rotate_interval = interval(v);
        }
        if let Some(v) = file.listen_for_signals {
            cfg.listen_for_signals = v;
        }
        if let Some(v) = file.log.format {
            cfg.log.format = v;
        }
        if let Some(v) = file.log.level {
            cfg.log.level = v;
        }
        if file.log.file.is_some() {
            cfg.log.output_path = file.log.file;
        }
        Ok(cfg)
    }

    /// Override fields from `INSTRUMENT_*` variables that are set and valid.
    pub fn apply_env(&mut self) {
        self.debug = parse_bool("INSTRUMENT_DEBUG", self.debug);
        self.trace = parse_bool("INSTRUMENT_TRACE", self.trace);
        self.silent = parse_bool("INSTRUMENT_SILENT", self.silent);
        self.flush_interval = parse_interval("INSTRUMENT_FLUSH_INTERVAL", self.flush_interval);
        self.rotate_interval = parse_interval("INSTRUMENT_ROTATE_INTERVAL", self.rotate_interval);
        self.listen_for_signals = parse_bool("INSTRUMENT_SIGNALS", self.listen_for_signals);
        if let Some(format) = std::env::var("INSTRUMENT_LOG_FORMAT")
            .ok()
            .and_then(|v| v.parse::<LogFormat>().ok())
        {
            self.log.format = format;
        }
        if let Ok(level) = std::env::var("INSTRUMENT_LOG_LEVEL") {
            if !level.trim().is_empty() {
                self.log.level = level;
            }
        }
        if let Ok(path) = std::env::var("INSTRUMENT_LOG_FILE") {
            if !path.trim().is_empty() {
                self.log.output_path = Some(PathBuf::from(path));
            }
        }
    }
}

/// Parse a boolean env var, returning `default` on missing or invalid.
fn parse_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Parse an interval in seconds, returning `default` on missing or invalid.
fn parse_interval(key: &str, default: Duration) -> Duration {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().map(interval).unwrap_or(default),
        Err(_) => default,
    }
}

fn interval(secs: u64) -> Duration {
    Duration::from_secs(secs.max(MIN_INTERVAL_SECS))
}

/// Load configuration from environment variables over the defaults.
pub fn load() -> TelemetryConfig {
    let mut cfg = TelemetryConfig::default();
    cfg.apply_env();
    cfg
}

/// Load a TOML file, then apply environment overrides.
pub fn load_file(path: impl AsRef<Path>) -> Result<TelemetryConfig, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    let mut cfg = TelemetryConfig::from_toml_str(&text)?;
    cfg.apply_env();
    Ok(cfg)
}
