//! Sessionlink Session Channel Client Library
//!
//! A persistent real-time session channel between a client and a server,
//! with an application-level login handshake, periodic heartbeats,
//! automatic reconnection with capped exponential backoff, and handling
//! of server-initiated forced logout.

pub mod channel;
pub mod cli;
pub mod config;
pub mod notify;
pub mod protocol;

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::LogConfig;

/// Application result type for consistent error handling
pub type AppResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Initialize tracing subscriber for logging.
///
/// When a [`LogConfig`] is provided, log lines are additionally written to
/// the configured file. The returned guard must be kept alive for the
/// duration of the process so buffered log lines are flushed.
pub fn init_logging(
    level: &str,
    log: Option<&LogConfig>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("sessionlink={}", level).into());

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());

    match log {
        Some(log) => {
            let path = Path::new(&log.file_path);
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            if let Some(dir) = dir {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            }
            let file_name = path
                .file_name()
                .map(|name| name.to_os_string())
                .unwrap_or_else(|| "sessionlink.log".into());
            let appender =
                tracing_appender::rolling::never(dir.unwrap_or_else(|| Path::new(".")), file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            registry.init();
            Ok(None)
        }
    }
}
