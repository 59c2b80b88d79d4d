//! Logging macros against the default instance.
//!
//! The message is only formatted when the level is enabled.
//!
//! ```no_run
//! let scope = instrument_core::Scope::root().with("user", "ada");
//! instrument_core::info!(&scope, "logged in after {} attempts", 2);
//! ```

#[doc(hidden)]
#[macro_export]
macro_rules! __log {
    ($level:expr, $scope:expr, $($arg:tt)+) => {{
        let telemetry = $crate::global();
        if telemetry.enabled($level) {
            telemetry.log_at(
                $scope,
                $level,
                $crate::Location { file: file!(), line: line!(), column: column!() },
                format!($($arg)+),
            );
        }
    }};
}

#[macro_export]
macro_rules! trace {
    ($scope:expr, $($arg:tt)+) => {
        $crate::__log!($crate::Level::Trace, $scope, $($arg)+)
    };
}

#[macro_export]
macro_rules! debug {
    ($scope:expr, $($arg:tt)+) => {
        $crate::__log!($crate::Level::Debug, $scope, $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    ($scope:expr, $($arg:tt)+) => {
        $crate::__log!($crate::Level::Info, $scope, $($arg)+)
    };
}

#[macro_export]
macro_rules! warn {
    ($scope:expr, $($arg:tt)+) => {
        $crate::__log!($crate::Level::Warn, $scope, $($arg)+)
    };
}

#[macro_export]
macro_rules! error {
    ($scope:expr, $($arg:tt)+) => {
        $crate::__log!($crate::Level::Error, $scope, $($arg)+)
    };
}
