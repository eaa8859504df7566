//! Logging utilities for the Carebook crates.
//!
//! This module provides a standardized approach to logging. It includes
//! functions for initializing the tracing subscriber, optionally with a daily
//! rolling JSON file, and helpers for logging results.

use carebook_config::LoggingConfig;
use std::str::FromStr;
use tracing::{error, info, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber at INFO.
///
/// # Examples
///
/// ```
/// use carebook_common::logging;
///
/// // Initialize with default log level (INFO)
/// logging::init();
///
/// // Calling again is harmless; the first subscriber stays installed
/// logging::init_with_level(tracing::Level::DEBUG);
/// ```
pub fn init() {
    init_with_level(Level::INFO);
}

/// Initialize the tracing subscriber with a specific log level.
///
/// The level applies to the `carebook` targets; `RUST_LOG` still controls the rest.
///
/// # Arguments
///
/// * `level` - The minimum log level to display.
pub fn init_with_level(level: Level) {
    // Use try_init to handle the case where a global default subscriber has already been set
    let result = tracing_subscriber::registry()
        .with(stdout_layer())
        .with(carebook_filter(level))
        .try_init();

    if result.is_ok() {
        info!("Logging initialized at level: {}", level);
    }
}

/// Initialize logging from the `logging` configuration section.
///
/// When `directory` is set, JSON lines are additionally written to a daily rolling
/// file. The returned guard must be kept alive for the file writer to flush.
pub fn init_from_config(config: &LoggingConfig) -> Option<WorkerGuard> {
    let level = match Level::from_str(&config.level) {
        Ok(level) => level,
        Err(_) => {
            eprintln!("Unknown log level '{}', using info", config.level);
            Level::INFO
        }
    };

    let Some(directory) = config.directory.as_deref() else {
        init_with_level(level);
        return None;
    };

    let file_appender = tracing_appender::rolling::daily(directory, &config.file_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_target(true)
        .json()
        .with_writer(non_blocking);

    let result = tracing_subscriber::registry()
        .with(stdout_layer())
        .with(file_layer)
        .with(carebook_filter(level))
        .try_init();

    if result.is_ok() {
        info!(
            "Logging initialized at level: {} (JSON logs in {})",
            level, directory
        );
    }
    Some(guard)
}

fn stdout_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_thread_names(true)
}

fn carebook_filter(level: Level) -> EnvFilter {
    let filter = EnvFilter::from_default_env();
    match format!("carebook={}", level).parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

/// Log an error with context at the ERROR level.
///
/// # Arguments
///
/// * `error` - The error to log.
/// * `context` - Additional context information about the error.
pub fn log_error<E: std::fmt::Display>(error: E, context: &str) {
    error!("{}: {}", context, error);
}

/// Log a failed best-effort step at the WARN level.
pub fn log_degraded<E: std::fmt::Display>(error: E, context: &str) {
    warn!("{}: {}", context, error);
}

/// Log a result, with different messages for success and error cases.
///
/// # Arguments
///
/// * `result` - The result to log.
/// * `success_message` - The message to log if the result is Ok.
/// * `error_context` - Additional context information to include if the result is Err.
///
/// # Returns
///
/// The original result, allowing this function to be used in a chain.
pub fn log_result<T, E: std::fmt::Display>(
    result: Result<T, E>,
    success_message: &str,
    error_context: &str,
) -> Result<T, E> {
    match &result {
        Ok(_) => info!("{}", success_message),
        Err(e) => error!("{}: {}", error_context, e),
    }
    result
}
