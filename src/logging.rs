//! Console and per-run file logging.
//!
//! `main` installs the console subscriber once. Each run gets its own
//! [`Dispatch`] that writes to the console and to
//! `{logs_dir}/process_{YYYYmmdd_HHMMSS}_{tag}.log`; attach it to the run
//! future with [`tracing::instrument::WithSubscriber`] so concurrent runs
//! never share a log file.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use tracing::Dispatch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{PipelineError, Result};

fn env_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "promoreel=debug,info" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global console subscriber (compact, no target).
///
/// `RUST_LOG` wins over `verbose` when set. Calling twice is harmless.
pub fn init_console(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .try_init();
}

/// Log file for a run started now
#[must_use]
pub fn run_log_path(logs_dir: &Path, tag: &str) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    logs_dir.join(format!("process_{stamp}_{tag}.log"))
}

/// Dispatcher for one run: console plus a non-ANSI file layer.
///
/// Returns the dispatcher and the log file path.
pub fn run_dispatch(logs_dir: &Path, tag: &str, verbose: bool) -> Result<(Dispatch, PathBuf)> {
    std::fs::create_dir_all(logs_dir).map_err(|e| {
        PipelineError::Configuration(format!("cannot create logs dir {}: {e}", logs_dir.display()))
    })?;
    let path = run_log_path(logs_dir, tag);
    let file = File::create(&path).map_err(|e| {
        PipelineError::Configuration(format!("cannot create log file {}: {e}", path.display()))
    })?;

    let subscriber = tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file)),
        );

    Ok((Dispatch::new(subscriber), path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::instrument::WithSubscriber;

    #[test]
    fn test_log_path_format() {
        let path = run_log_path(Path::new("/var/log/promoreel"), "1a2b3c4d");
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("process_"));
        assert!(name.ends_with("_1a2b3c4d.log"));
        assert_eq!(name.len(), "process_".len() + 15 + "_1a2b3c4d.log".len());
    }

    #[tokio::test]
    async fn test_run_dispatch_writes_file() {
        let dir = std::env::temp_dir().join(format!("promoreel-logs-{}", uuid::Uuid::new_v4()));
        let (dispatch, path) = run_dispatch(&dir, "feedbeef", false).unwrap();

        async {
            tracing::info!("Content kind: video");
        }
        .with_subscriber(dispatch)
        .await;

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Content kind: video"));
        assert!(!content.contains('\u{1b}'), "file log must not contain ANSI escapes");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
