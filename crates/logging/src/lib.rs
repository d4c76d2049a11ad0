//! VeilNet Logging
//!
//! One place to initialize `tracing` for node binaries and integration
//! tests. Honors `RUST_LOG` when set; otherwise uses the given level.

use tracing_subscriber::EnvFilter;

/// Verbosity of the node's log output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Map a `-v`/`-vv` style verbosity count to a level.
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => Self::Info,
            1 => Self::Debug,
            _ => Self::Trace,
        }
    }

    fn directive(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Install the global subscriber.
///
/// # Panics
///
/// Panics if a subscriber is already installed; use [`try_init`] to
/// tolerate that (tests initialize repeatedly).
pub fn init(level: LogLevel) {
    try_init(level).expect("logging already initialized");
}

/// Install the global subscriber unless one is already set.
pub fn try_init(level: LogLevel) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_mapping() {
        assert_eq!(LogLevel::from_verbosity(0), LogLevel::Info);
        assert_eq!(LogLevel::from_verbosity(1), LogLevel::Debug);
        assert_eq!(LogLevel::from_verbosity(2), LogLevel::Trace);
        assert_eq!(LogLevel::from_verbosity(9), LogLevel::Trace);
    }

    #[test]
    fn default_is_info() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn double_init_reports_error() {
        let _ = try_init(LogLevel::Debug);
        assert!(try_init(LogLevel::Debug).is_err());
    }
}
