//! Logging setup for the launcher
//!
//! Console output is human-readable or JSON; `--log-dir` adds a daily rolling
//! JSON log file written through a non-blocking appender.

use anyhow::Result;
use std::path::Path;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "smart-sync.log";

/// Map a `--log-level` value to a tracing level, defaulting to info
pub fn parse_level(log_level: &str) -> tracing::Level {
    match log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

/// Filter used when `RUST_LOG` is not set.
///
/// The library and the `smart-sync` binary share the `smart_sync` target prefix.
pub fn default_directives(log_level: &str) -> String {
    format!("smart_sync={}", parse_level(log_level).as_str().to_lowercase())
}

/// Install the global subscriber.
///
/// The returned guard flushes the file appender on drop and must outlive
/// every log call.
pub fn init_logging(log_level: &str, json: bool, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(log_level)));

    let console = if json {
        fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(rolling::daily(dir, LOG_FILE_PREFIX));
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .json()
                .with_current_span(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), tracing::Level::DEBUG);
        assert_eq!(parse_level("warn"), tracing::Level::WARN);
        assert_eq!(parse_level("verbose"), tracing::Level::INFO);
    }

    #[test]
    fn test_default_directives() {
        assert_eq!(default_directives("debug"), "smart_sync=debug");
        assert_eq!(default_directives("nonsense"), "smart_sync=info");
    }
}
