//! Logging setup: a static `tracing` filter, ANSI console output, and a
//! daily-rotating file layer.
//!
//! Unlike the teacher's dynamic DB-backed filter reload and websocket log
//! streaming (which serve an admin UI outside this crate's scope), the
//! filter here is fixed for the process lifetime.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::utils::fs;

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "transcribe_service=info,sqlx=warn";

/// Custom timer that formats timestamps in the server's local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Holds the non-blocking file writer guard alive for the process lifetime.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    log_dir: PathBuf,
}

impl LoggingGuard {
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

/// Initialize logging. Respects `RUST_LOG` if set, otherwise falls back to
/// [`DEFAULT_LOG_FILTER`].
pub fn init_logging(log_dir: &str) -> crate::Result<LoggingGuard> {
    let log_path = PathBuf::from(log_dir);
    fs::ensure_dir_all_sync_with_op("creating log directory", &log_path)?;

    let file_appender = tracing_appender::rolling::daily(&log_path, "transcribe-service.log");
    let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer))
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(LocalTimer),
        )
        .try_init()
        .map_err(|e| crate::Error::Other(format!("failed to set global subscriber: {e}")))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
        log_dir: log_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_is_sane() {
        assert!(DEFAULT_LOG_FILTER.contains("transcribe_service=info"));
        assert!(DEFAULT_LOG_FILTER.contains("sqlx=warn"));
    }
}
