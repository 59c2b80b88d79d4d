//! Runtime-adjustable debug and trace visibility.
//!
//! Flags are plain atomics: a toggle may take a moment to reach other threads
//! and no emission path ever blocks on it.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::level::Level;

#[derive(Debug, Default)]
pub struct Verbosity {
    debug: AtomicBool,
    trace: AtomicBool,
}

impl Verbosity {
    pub fn new(debug: bool, trace: bool) -> Self {
        let verbosity = Self::default();
        verbosity.set_debug(debug);
        verbosity.set_trace(trace);
        verbosity
    }

    pub fn set_debug(&self, enabled: bool) {
        self.debug.store(enabled, Ordering::Relaxed);
    }

    /// Enabling trace also enables debug. Disabling trace leaves debug as it is.
    pub fn set_trace(&self, enabled: bool) {
        if enabled {
            self.debug.store(true, Ordering::Relaxed);
        }
        self.trace.store(enabled, Ordering::Relaxed);
    }

    /// Flip debug, returning the new state.
    pub fn toggle_debug(&self) -> bool {
        !self.debug.fetch_xor(true, Ordering::Relaxed)
    }

    /// Flip trace, returning the new state.
    pub fn toggle_trace(&self) -> bool {
        let enabled = !self.trace.load(Ordering::Relaxed);
        self.set_trace(enabled);
        enabled
    }

    pub fn is_debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    pub fn is_trace(&self) -> bool {
        self.trace.load(Ordering::Relaxed)
    }

    /// Whether a payload at `level` may be assembled and dispatched.
    pub fn allows(&self, level: Level) -> bool {
        match level {
            Level::Trace => self.is_trace(),
            Level::Debug => self.is_debug(),
            _ => true,
        }
    }
}

/// Operator signals: `SIGHUP` toggles debug, `SIGUSR1` toggles trace.
#[cfg(unix)]
pub(crate) fn spawn_signal_listener(
    verbosity: std::sync::Arc<Verbosity>,
    shutdown: tokio_util::sync::CancellationToken,
) -> tokio::task::JoinHandle<()> {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let (mut hangup, mut user1) =
            match (signal(SignalKind::hangup()), signal(SignalKind::user_defined1())) {
                (Ok(h), Ok(u)) => (h, u),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::warn!(error = %e, "Verbosity signal listener unavailable");
                    return;
                }
            };

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                Some(()) = hangup.recv() => {
                    let enabled = verbosity.toggle_debug();
                    tracing::info!(debug = enabled, "Debug output toggled");
                }
                Some(()) = user1.recv() => {
                    let enabled = verbosity.toggle_trace();
                    tracing::info!(trace = enabled, debug = verbosity.is_debug(), "Trace output toggled");
                }
                else => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_hide_verbose_levels() {
        let v = Verbosity::default();
        assert!(!v.allows(Level::Debug));
        assert!(!v.allows(Level::Trace));
        assert!(v.allows(Level::Info));
        assert!(v.allows(Level::Metric));
    }

    #[test]
    fn test_trace_on_forces_debug() {
        let v = Verbosity::default();
        v.set_trace(true);
        assert!(v.is_debug());
        assert!(v.allows(Level::Trace));
    }

    #[test]
    fn test_trace_off_leaves_debug() {
        let v = Verbosity::new(false, true);
        v.set_trace(false);
        assert!(!v.is_trace());
        assert!(v.is_debug());
    }

    #[test]
    fn test_toggles_report_new_state() {
        let v = Verbosity::default();
        assert!(v.toggle_debug());
        assert!(!v.toggle_debug());
        assert!(v.toggle_trace());
        assert!(v.is_debug());
        assert!(!v.toggle_trace());
        assert!(v.is_debug());
    }
}
