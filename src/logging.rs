// ABOUTME: tracing subscriber setup selected by PII_LOG_FORMAT / RUST_LOG / PII_LOG_LEVEL
// ABOUTME: Mirrors the teacher's LoggingConfig::from_env + LogFormat selection
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Logging (C16, §4.15).

use tracing_subscriber::EnvFilter;

/// Output format for the `tracing_subscriber::fmt` layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl LogFormat {
    fn from_env_str(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "compact" => Self::Compact,
            _ => Self::Pretty,
        }
    }
}

/// Logging configuration resolved from the environment (§4.15).
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub filter_directive: String,
}

impl LoggingConfig {
    /// Reads `PII_LOG_FORMAT` (`pretty`/`json`/`compact`) and `RUST_LOG` or
    /// `PII_LOG_LEVEL` (in that priority order), defaulting to pretty output
    /// at `info` level.
    #[must_use]
    pub fn from_env() -> Self {
        let format = std::env::var("PII_LOG_FORMAT")
            .map(|v| LogFormat::from_env_str(&v))
            .unwrap_or_default();
        let filter_directive = std::env::var("RUST_LOG")
            .or_else(|_| std::env::var("PII_LOG_LEVEL"))
            .unwrap_or_else(|_| "info".to_string());
        Self {
            format,
            filter_directive,
        }
    }
}

/// Installs the global `tracing` subscriber. Safe to call once per process;
/// subsequent calls are no-ops if a subscriber is already set.
pub fn init() {
    init_with(&LoggingConfig::from_env());
}

/// Installs the global subscriber with an explicit [`LoggingConfig`],
/// primarily for tests that want a deterministic format/level.
pub fn init_with(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(&config.filter_directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).try_init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().with_env_filter(filter).try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt().pretty().with_env_filter(filter).try_init(),
    };

    // A previously-installed subscriber is not an error: tests and repeated
    // `init()` calls within one process are both expected to land here.
    let _ = result;
}
