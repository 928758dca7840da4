use crate::config::StoreConfig;
use crate::error::RagStoreError;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Log file written inside `StoreConfig::log_dir`
pub const LOG_FILE_NAME: &str = "ragstore.log";

/// Initialize logging from a [`StoreConfig`]
///
/// Console plus an append-only `ragstore.log` in `log_dir`. `RUST_LOG`
/// takes precedence over `log_level`. Returns the log file path.
pub fn setup_logging(config: &StoreConfig) -> Result<PathBuf, RagStoreError> {
    setup_file_logging(&config.log_dir, &config.log_level)
}

/// Initialize console + file logging in an explicit directory
pub fn setup_file_logging(log_dir: &Path, log_level: &str) -> Result<PathBuf, RagStoreError> {
    std::fs::create_dir_all(log_dir).map_err(|e| {
        RagStoreError::config(format!(
            "Failed to create log directory {}: {}",
            log_dir.display(),
            e
        ))
    })?;

    let log_file_path = log_dir.join(LOG_FILE_NAME);
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)
        .map_err(|e| {
            RagStoreError::config(format!(
                "Failed to open log file {}: {}",
                log_file_path.display(),
                e
            ))
        })?;

    let console_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(env_filter(log_level));

    let file_layer = fmt::layer()
        .with_writer(log_file)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_filter(env_filter(log_level));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| RagStoreError::config(format!("Logging already initialized: {}", e)))?;

    tracing::info!(
        "Logging initialized: level={}, log_file={}",
        log_level,
        log_file_path.display()
    );

    Ok(log_file_path)
}

/// Console-only logging
///
/// For tools that own their log files. Safe to call more than once; later
/// calls are ignored.
pub fn setup_console_logging(log_level: &str) {
    let initialized = tracing_subscriber::fmt()
        .with_target(true)
        .with_line_number(true)
        .with_env_filter(env_filter(log_level))
        .try_init()
        .is_ok();

    if initialized {
        tracing::info!("Console logging initialized: level={}", log_level);
    }
}

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(parse_log_level(log_level).as_str().to_lowercase()))
}

/// Parse string to tracing Level
pub fn parse_log_level(level: &str) -> Level {
    match level.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!("Invalid log level '{}', defaulting to INFO", level);
            Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("trace"), Level::TRACE);
        assert_eq!(parse_log_level("debug"), Level::DEBUG);
        assert_eq!(parse_log_level("info"), Level::INFO);
        assert_eq!(parse_log_level("warn"), Level::WARN);
        assert_eq!(parse_log_level("error"), Level::ERROR);
        assert_eq!(parse_log_level("invalid"), Level::INFO);
    }

    #[test]
    fn test_parse_log_level_case_insensitive() {
        assert_eq!(parse_log_level("INFO"), Level::INFO);
        assert_eq!(parse_log_level(" Debug "), Level::DEBUG);
        assert_eq!(parse_log_level("WARNING"), Level::WARN);
    }

    #[test]
    fn test_console_logging_is_idempotent() {
        setup_console_logging("debug");
        setup_console_logging("info");
    }
}
