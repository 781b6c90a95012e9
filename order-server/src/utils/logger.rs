//! Logging Infrastructure
//!
//! Structured logging setup with support for both development and production environments.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Initialize the logger
pub fn init_logger() -> Option<WorkerGuard> {
    init_logger_with_file(None, false, None)
}

/// Initialize the logger with optional file output
///
/// `RUST_LOG` overrides `log_level` when set. The returned guard flushes the
/// file writer and must be kept alive for the lifetime of the process.
pub fn init_logger_with_file(
    log_level: Option<&str>,
    json: bool,
    log_dir: Option<&str>,
) -> Option<WorkerGuard> {
    let level = log_level.unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout = if json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer()
            .with_file(false)
            .with_line_number(false)
            .with_thread_ids(false)
            .with_target(false)
            .boxed()
    };

    let (file, guard) = match log_dir.map(Path::new).filter(|p| p.exists()) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "order-server");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // 测试中可能重复初始化
    if tracing_subscriber::registry()
        .with(filter)
        .with(stdout)
        .with(file)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global subscriber already installed");
    }
    guard
}
