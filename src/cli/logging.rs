//! Logging setup
//!
//! `PROSEFIX_LOG` takes precedence over the level from the settings or
//! `--log-level`. With a log directory, events go to a daily rolling JSON
//! file; otherwise compact output to stderr.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "PROSEFIX_LOG";
const LOG_FILE: &str = "prosefix.log";

/// Build the filter from `PROSEFIX_LOG`, falling back to `level`
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Keep the returned guard alive until exit
/// so buffered file output is flushed.
pub fn init_logging(level: &str, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = env_filter(level);

    match log_dir.and_then(usable_log_dir) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(file_layer)
                .try_init();
            Some(guard)
        }
        None => {
            let stderr_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(false);
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .try_init();
            None
        }
    }
}

/// `dir` if it exists or can be created; otherwise warn and return None
pub fn usable_log_dir(dir: &Path) -> Option<&Path> {
    match std::fs::create_dir_all(dir) {
        Ok(()) => Some(dir),
        Err(e) => {
            eprintln!(
                "warning: cannot create log directory {}: {}; logging to stderr",
                dir.display(),
                e
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_falls_back() {
        // Never panics on garbage input
        let _ = env_filter("not a [valid filter");
        let _ = env_filter("debug");
    }

    #[test]
    fn test_log_dir_created_or_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs").join("prosefix");
        assert_eq!(usable_log_dir(&nested), Some(nested.as_path()));
        assert!(nested.is_dir());

        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(usable_log_dir(&file.path().join("logs")).is_none());
    }
}
