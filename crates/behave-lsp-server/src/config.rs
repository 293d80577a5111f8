//! Server configuration parsed from environment variables.
//!
//! This module provides configuration types and parsing for the language
//! server. All settings can be overridden via environment variables prefixed
//! with `BEHAVE_LSP_`. Glob settings supplied by the editor live in
//! [`crate::settings`].

use std::env;
use std::str::FromStr;

use crate::error::ServerError;
use crate::indexing::ScanSettings;

/// Log level enumeration matching tracing crate levels.
///
/// Defaults to `Info` when not specified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Most verbose logging, includes all trace spans.
    Trace,
    /// Debug-level information for development.
    Debug,
    /// Standard informational messages.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for failures.
    Error,
}

impl FromStr for LogLevel {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(ServerError::InvalidConfig(format!(
                "unknown log level '{s}', expected one of: trace, debug, info, warn, error"
            ))),
        }
    }
}

impl LogLevel {
    /// Convert to a tracing filter directive string.
    #[must_use]
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Default number of files read concurrently by a full scan.
const DEFAULT_SCAN_BATCH_SIZE: usize = 20;

/// Default number of queued re-scans honoured for one file before giving up.
const DEFAULT_MAX_RESCAN_DEPTH: usize = 5;

/// Configuration for the language server.
///
/// # Environment Variables
///
/// - `BEHAVE_LSP_LOG_LEVEL`: Sets the log level (trace, debug, info, warn,
///   error)
/// - `BEHAVE_LSP_SCAN_BATCH_SIZE`: Files read concurrently during a full scan
/// - `BEHAVE_LSP_MAX_RESCAN_DEPTH`: Queued re-scans honoured per file before
///   a scan gives up
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: LogLevel,
    /// Number of files read concurrently during a full scan.
    pub scan_batch_size: usize,
    /// Number of queued re-scans honoured for one file.
    pub max_rescan_depth: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
            max_rescan_depth: DEFAULT_MAX_RESCAN_DEPTH,
        }
    }
}

fn parse_positive(name: &str, value: &str) -> Result<usize, ServerError> {
    match value.trim().parse::<usize>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(ServerError::InvalidConfig(format!(
            "invalid {name} value '{value}', expected a positive integer"
        ))),
    }
}

fn read_positive(var: &str, name: &str, default: usize) -> Result<usize, ServerError> {
    env::var(var).map_or(Ok(default), |val| parse_positive(name, &val))
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Falls back to defaults for missing values.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::InvalidConfig` if an environment variable contains
    /// an invalid value.
    pub fn from_env() -> Result<Self, ServerError> {
        let log_level = match env::var("BEHAVE_LSP_LOG_LEVEL") {
            Ok(val) => val.parse()?,
            Err(_) => LogLevel::default(),
        };

        Ok(Self {
            log_level,
            scan_batch_size: read_positive(
                "BEHAVE_LSP_SCAN_BATCH_SIZE",
                "scan batch size",
                DEFAULT_SCAN_BATCH_SIZE,
            )?,
            max_rescan_depth: read_positive(
                "BEHAVE_LSP_MAX_RESCAN_DEPTH",
                "rescan depth",
                DEFAULT_MAX_RESCAN_DEPTH,
            )?,
        })
    }

    /// Apply optional overrides to an existing configuration.
    ///
    /// This is intended for CLI overrides that should take precedence over
    /// environment-based defaults. A zero batch size is ignored.
    #[must_use]
    pub fn apply_overrides(
        mut self,
        log_level: Option<LogLevel>,
        scan_batch_size: Option<usize>,
    ) -> Self {
        if let Some(level) = log_level {
            self.log_level = level;
        }

        if let Some(size) = scan_batch_size.filter(|size| *size > 0) {
            self.scan_batch_size = size;
        }

        self
    }

    /// Create a new configuration with the specified log level.
    #[must_use]
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Scan tuning handed to each index.
    #[must_use]
    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            batch_size: self.scan_batch_size,
            max_rescan_depth: self.max_rescan_depth,
        }
    }
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests require explicit panic messages for debugging failures"
)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("trace", LogLevel::Trace)]
    #[case("debug", LogLevel::Debug)]
    #[case("info", LogLevel::Info)]
    #[case("warn", LogLevel::Warn)]
    #[case("warning", LogLevel::Warn)]
    #[case("error", LogLevel::Error)]
    #[case("TRACE", LogLevel::Trace)]
    #[case("Debug", LogLevel::Debug)]
    fn log_level_parses_valid_values(#[case] input: &str, #[case] expected: LogLevel) {
        assert_eq!(input.parse::<LogLevel>().ok(), Some(expected));
    }

    #[test]
    fn log_level_rejects_invalid_values() {
        let result = "invalid".parse::<LogLevel>();
        assert!(result.unwrap_err().to_string().contains("unknown log level"));
    }

    #[test]
    fn server_config_default_values() {
        let config = ServerConfig::default();
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.scan_batch_size, 20);
        assert_eq!(config.max_rescan_depth, 5);
    }

    #[test]
    fn server_config_apply_overrides_updates_selected_fields() {
        let config = ServerConfig::default().apply_overrides(Some(LogLevel::Error), Some(4));
        assert_eq!(config.log_level, LogLevel::Error);
        assert_eq!(config.scan_batch_size, 4);

        let config = ServerConfig::default().apply_overrides(None, Some(0));
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.scan_batch_size, 20);
    }

    #[rstest]
    #[case("8", Some(8))]
    #[case(" 3 ", Some(3))]
    #[case("0", None)]
    #[case("-1", None)]
    #[case("many", None)]
    fn positive_values_are_validated(#[case] raw: &str, #[case] expected: Option<usize>) {
        assert_eq!(parse_positive("scan batch size", raw).ok(), expected);
    }

    #[test]
    fn scan_settings_mirror_the_config() {
        let settings = ServerConfig::default().apply_overrides(None, Some(7)).scan_settings();
        assert_eq!(settings.batch_size, 7);
        assert_eq!(settings.max_rescan_depth, 5);
    }
}
