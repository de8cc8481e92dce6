//! Logging setup.

use std::path::Path;

use pdvolume_shared::errors::{PdError, PdResult};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Log file name inside the log directory (rotated daily).
pub const LOG_FILE_NAME: &str = "pdvolume.log";

/// Initialize tracing.
///
/// `RUST_LOG` wins over `default_level`. With `log_dir` set, output goes to a
/// daily-rotated file and the returned guard must be kept alive until exit;
/// otherwise output goes to stderr.
pub fn init_logging(log_dir: Option<&Path>, default_level: &str) -> PdResult<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| PdError::Config(format!("invalid log level {default_level:?}: {e}")))?;

    let Some(log_dir) = log_dir else {
        let _ = tracing_subscriber::fmt()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter)
            .try_init();
        return Ok(None);
    };

    std::fs::create_dir_all(log_dir)
        .map_err(|e| PdError::filesystem("create dir", log_dir, e))?;

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Volume spans (`set_up`, `tear_down`) prefix each event with the
    // workload and volume; close events carry the call duration.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_span_events(FmtSpan::CLOSE)
                .with_ansi(false),
        )
        .try_init();

    Ok(Some(guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_logging_creates_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");

        let guard = init_logging(Some(&log_dir), "info").unwrap();
        assert!(guard.is_some());
        assert!(log_dir.is_dir());

        tracing::info_span!("set_up", pod_uid = "pod-1", volume = "data")
            .in_scope(|| tracing::info!("bound"));
        // Dropping the guard flushes the writer.
        drop(guard);

        let mut logged = String::new();
        for entry in std::fs::read_dir(&log_dir).unwrap() {
            logged.push_str(&std::fs::read_to_string(entry.unwrap().path()).unwrap());
        }
        assert!(logged.contains("pod_uid"));
        assert!(logged.contains("bound"));
    }
}
