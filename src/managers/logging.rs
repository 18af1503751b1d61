//! Logging manager with file rotation
//!
//! Dual-output logging:
//! - Console: INFO level with concise format
//! - File: configurable level with daily rotation

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::expand_tilde;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for log files
    pub log_directory: PathBuf,
    /// Log level for file output (console always uses INFO)
    pub log_level: Level,
    /// Maximum number of log files to keep
    pub max_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_directory: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("logs"),
            log_level: Level::DEBUG,
            max_files: 10,
        }
    }
}

impl LoggingConfig {
    /// Create from global config values
    pub fn from_config(log_directory: &Path, log_level: &str, max_files: u32) -> Self {
        let level = match log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" | "warning" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };

        Self {
            log_directory: log_directory.to_path_buf(),
            log_level: level,
            max_files,
        }
    }
}

/// Initialize logging with console and file outputs
///
/// Returns a guard that must be kept alive for the duration of the program.
/// When the guard is dropped, any remaining logs are flushed to disk.
pub fn init_logging(config: &LoggingConfig) -> Result<LogGuard> {
    let log_dir = expand_tilde(&config.log_directory);
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {:?}", log_dir))?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "backhaul.log");
    let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);

    // File layer: detailed format, no colors
    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_span_events(FmtSpan::NONE)
        .with_filter(level_filter(config.log_level));

    // Console layer: INFO level, concise format
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .with_level(true)
        .with_span_events(FmtSpan::NONE)
        .with_filter(level_filter(Level::INFO));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .init();

    cleanup_old_logs(&log_dir, config.max_files)?;

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}

/// Initialize simple console-only logging (for commands that don't back up)
pub fn init_console_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .init();
}

/// Create a level filter for tracing layers
fn level_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("backhaul={}", level))
            .add_directive(format!("{}", level).parse().unwrap())
    })
}

/// Cleanup old log files, keeping only the most recent N files
fn cleanup_old_logs(log_dir: &Path, max_files: u32) -> Result<()> {
    let mut log_files: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with("backhaul") && name.contains(".log")
        })
        .collect();

    // Sort by modification time (newest first)
    log_files.sort_by(|a, b| {
        let a_time = a.metadata().and_then(|m| m.modified()).ok();
        let b_time = b.metadata().and_then(|m| m.modified()).ok();
        b_time.cmp(&a_time)
    });

    for file in log_files.into_iter().skip(max_files as usize) {
        if let Err(e) = fs::remove_file(file.path()) {
            tracing::warn!("Failed to remove old log file {:?}: {}", file.path(), e);
        } else {
            tracing::debug!("Removed old log file: {:?}", file.path());
        }
    }

    Ok(())
}

/// Guard that keeps the logging system alive
///
/// When dropped, flushes any remaining logs to disk.
pub struct LogGuard {
    _file_guard: WorkerGuard,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.max_files, 10);
    }

    #[test]
    fn test_logging_config_from_config() {
        let config = LoggingConfig::from_config(Path::new("/tmp/logs"), "warn", 5);
        assert_eq!(config.log_level, Level::WARN);
        assert_eq!(config.max_files, 5);
    }

    #[test]
    fn test_logging_config_unknown_level_falls_back_to_info() {
        let config = LoggingConfig::from_config(Path::new("/tmp/logs"), "verbose", 5);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn test_cleanup_old_logs() {
        let temp_dir = TempDir::new().unwrap();

        for i in 0..5 {
            let path = temp_dir.path().join(format!("backhaul.{}.log", i));
            fs::write(&path, format!("log content {}", i)).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        cleanup_old_logs(temp_dir.path(), 3).unwrap();

        let remaining: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();

        assert_eq!(remaining.len(), 3);
    }
}
