// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Logging setup for bridge consumers.
//!
//! The bridge emits `tracing` events under three targets:
//!
//! | Target                     | Events                                   |
//! |----------------------------|------------------------------------------|
//! | `rust_ai_bridge::runtime`  | initialization (info), failures (warn)   |
//! | `rust_ai_bridge::dispatch` | per-call completion and exceptions (debug) |
//! | `rust_ai_bridge::codec`    | contiguity copies (debug)                |
//!
//! Applications that already install a subscriber need nothing from this
//! module. The rest can call [`init_logging`] once at startup. `RUST_LOG`
//! always overrides the configured filter.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

use crate::error::BridgeError;

/// Configuration for [`init_logging`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level for everything outside the bridge.
    pub default_level: LogLevel,
    /// Level for the `rust_ai_bridge` targets; `None` inherits the default.
    pub bridge_level: Option<LogLevel>,
    /// Include timestamps in log output.
    pub with_timestamps: bool,
    /// Include target (module path) in log output.
    pub with_target: bool,
    /// Include source file and line numbers.
    pub with_file_line: bool,
    /// Use ANSI colors (disable for file output).
    pub with_ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: LogLevel::Info,
            bridge_level: None,
            with_timestamps: true,
            with_target: true,
            with_file_line: false,
            with_ansi: true,
        }
    }
}

impl LogConfig {
    /// Create a new logging configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default log level.
    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.default_level = level;
        self
    }

    /// Set a separate level for the bridge's own targets.
    #[must_use]
    pub fn with_bridge_level(mut self, level: LogLevel) -> Self {
        self.bridge_level = Some(level);
        self
    }

    /// Enable or disable timestamps.
    #[must_use]
    pub fn with_timestamps(mut self, enable: bool) -> Self {
        self.with_timestamps = enable;
        self
    }

    /// Enable or disable ANSI colors.
    #[must_use]
    pub fn with_ansi(mut self, enable: bool) -> Self {
        self.with_ansi = enable;
        self
    }

    /// Verbose bridge tracing with file/line info.
    #[must_use]
    pub fn development() -> Self {
        Self {
            default_level: LogLevel::Info,
            bridge_level: Some(LogLevel::Debug),
            with_timestamps: true,
            with_target: true,
            with_file_line: true,
            with_ansi: true,
        }
    }

    /// Plain output for log ingestion.
    #[must_use]
    pub fn production() -> Self {
        Self {
            default_level: LogLevel::Info,
            bridge_level: None,
            with_timestamps: true,
            with_target: false,
            with_file_line: false,
            with_ansi: false,
        }
    }

    /// Warnings only, no decoration.
    #[must_use]
    pub fn testing() -> Self {
        Self {
            default_level: LogLevel::Warn,
            bridge_level: None,
            with_timestamps: false,
            with_target: false,
            with_file_line: false,
            with_ansi: false,
        }
    }

    /// `EnvFilter` directive equivalent to this configuration.
    ///
    /// ```rust
    /// use rust_ai_bridge::{LogConfig, LogLevel};
    ///
    /// let config = LogConfig::testing().with_bridge_level(LogLevel::Debug);
    /// assert_eq!(config.filter_directive(), "warn,rust_ai_bridge=debug");
    /// ```
    #[must_use]
    pub fn filter_directive(&self) -> String {
        match self.bridge_level {
            Some(bridge) => format!(
                "{},rust_ai_bridge={}",
                self.default_level.as_filter_str(),
                bridge.as_filter_str()
            ),
            None => self.default_level.as_filter_str().to_string(),
        }
    }
}

/// Log level enumeration.
///
/// Maps to tracing levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Errors only.
    Error,
    /// Warnings and above.
    Warn,
    /// Informational messages and above.
    #[default]
    Info,
    /// Debug messages and above.
    Debug,
    /// All messages including trace.
    Trace,
}

impl LogLevel {
    fn as_filter_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(BridgeError::invalid_config(format!("unknown log level: {other}"))),
        }
    }
}

static INIT_LOGGING: Once = Once::new();
static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Install a global `tracing` subscriber.
///
/// Only the first call has any effect. Returns `true` if a subscriber from
/// this crate is installed; `false` if another subscriber was already set.
///
/// ## Arguments
///
/// * `config` - Output format and levels; ignored after the first call
///
/// ## Why This Function
///
/// Demos and tests want bridge events on stderr without pulling in their own
/// subscriber setup. Installation uses `try_init`, so a host application that
/// configured `tracing` first keeps its subscriber.
///
/// ## Environment Override
///
/// `RUST_LOG` takes precedence over [`LogConfig::filter_directive`].
///
/// ## Example
///
/// ```rust
/// use rust_ai_bridge::{init_logging, LogConfig};
///
/// init_logging(&LogConfig::testing());
/// ```
pub fn init_logging(config: &LogConfig) -> bool {
    INIT_LOGGING.call_once(|| {
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.filter_directive());

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(config.with_ansi)
            .with_target(config.with_target)
            .with_file(config.with_file_line)
            .with_line_number(config.with_file_line);

        let installed = if config.with_timestamps {
            builder.try_init().is_ok()
        } else {
            builder.without_time().try_init().is_ok()
        };
        INSTALLED.store(installed, Ordering::Release);
    });
    INSTALLED.load(Ordering::Acquire)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.default_level, LogLevel::Info);
        assert!(config.bridge_level.is_none());
        assert_eq!(config.filter_directive(), "info");
    }

    #[test]
    fn test_log_config_presets() {
        let dev = LogConfig::development();
        assert_eq!(dev.filter_directive(), "info,rust_ai_bridge=debug");
        assert!(dev.with_file_line);

        let prod = LogConfig::production();
        assert!(!prod.with_ansi);

        let test = LogConfig::testing();
        assert_eq!(test.default_level, LogLevel::Warn);
        assert!(!test.with_timestamps);
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!(matches!(
            "verbose".parse::<LogLevel>(),
            Err(BridgeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        let first = init_logging(&LogConfig::testing());
        let second = init_logging(&LogConfig::development());
        assert_eq!(first, second);
    }
}
