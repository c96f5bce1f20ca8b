// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization
//!
//! Console output always; with the `file-logging` feature and a log
//! directory, a daily-rotated `hci-spi.log` as well.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;

/// Keeps file writers alive; logs are flushed when it is dropped
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Directory the log file is written to, if any
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

/// Build the filter for the given debug flags over `default_level`
pub fn build_filter(debug_flags: &CrateDebugFlags, default_level: &str) -> Result<EnvFilter> {
    let directives = debug_flags.to_filter_string(default_level);
    EnvFilter::try_new(&directives)
        .with_context(|| format!("Invalid log filter: {}", directives))
}

/// Initialize the global subscriber
///
/// # Arguments
/// * `debug_flags` - Per-crate debug flags
/// * `default_level` - Level for everything not named in the flags
/// * `log_dir` - Directory for the log file (`file-logging` feature only)
pub fn init_logging(
    debug_flags: &CrateDebugFlags,
    default_level: &str,
    log_dir: Option<PathBuf>,
) -> Result<LoggingGuard> {
    let mut layers = Vec::new();
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_filter(build_filter(debug_flags, default_level)?)
        .boxed();
    layers.push(console_layer);

    #[cfg(feature = "file-logging")]
    let file_guard = match &log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "hci-spi.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(build_filter(debug_flags, default_level)?)
                .boxed();
            layers.push(file_layer);
            Some(guard)
        }
        None => None,
    };

    #[cfg(not(feature = "file-logging"))]
    let log_dir = {
        if let Some(dir) = &log_dir {
            eprintln!(
                "Log directory {} ignored: built without the file-logging feature",
                dir.display()
            );
        }
        None
    };

    Registry::default()
        .with(layers)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guard: file_guard,
        log_dir,
    })
}

/// Console-only logging at `default_level`
pub fn init_logging_default(debug_flags: &CrateDebugFlags, default_level: &str) -> Result<LoggingGuard> {
    init_logging(debug_flags, default_level, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_accepts_crate_directives() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-hci-spi-transport".to_string()]);
        assert!(build_filter(&flags, "info").is_ok());
    }

    #[test]
    fn test_filter_rejects_bad_level() {
        let result = build_filter(&CrateDebugFlags::default(), "hci-spi=verbose");
        assert!(result.is_err());
    }
}
