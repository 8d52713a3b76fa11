//! Daily trigger.
//!
//! Sleeps until the next occurrence of a wall-clock time, performs one fresh
//! run, and repeats. Every run gets a new orchestrator, random source and log
//! file; nothing carries over between runs. Ctrl-C stops the loop, including
//! a run in progress.

use std::sync::Arc;

use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};
use tracing::instrument::WithSubscriber;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::{PipelineError, Result};
use crate::logging;
use crate::orchestrator::{Orchestrator, RunId};
use crate::types::RunResult;

/// Default daily slot
pub const DEFAULT_TIME: &str = "09:00";

/// Parse `HH:MM` (or `HH:MM:SS`)
pub fn parse_time(s: &str) -> Result<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|e| PipelineError::Configuration(format!("invalid time '{s}': {e}")))
}

/// First instant strictly after `now` whose local time is `at`.
///
/// When `at` falls into a DST gap on some day, the slot moves to the first
/// valid instant an hour later.
pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut day = now.date_naive();

    loop {
        let naive = day.and_time(at);
        let candidate = tz
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| {
                tz.from_local_datetime(&(naive + chrono::Duration::hours(1)))
                    .earliest()
            });
        if let Some(candidate) = candidate {
            if candidate > *now {
                return candidate;
            }
        }
        day = match day.checked_add_days(Days::new(1)) {
            Some(next) => next,
            None => return now.clone(),
        };
    }
}

/// One run with its own log file
pub async fn run_once(config: Arc<AppConfig>, seed: Option<u64>, verbose: bool) -> Result<RunResult> {
    let run_id = RunId::new();
    let (dispatch, log_path) = logging::run_dispatch(&config.run.logs_dir, &run_id.tag, verbose)?;

    async move {
        info!("Log file: {}", log_path.display());
        let mut orchestrator = Orchestrator::from_config(config)?;
        if let Some(seed) = seed {
            orchestrator = orchestrator.with_seed(seed);
        }
        orchestrator.run_as(run_id).await
    }
    .with_subscriber(dispatch)
    .await
}

/// Run every day at `at` until Ctrl-C
pub async fn run_daily(config: Arc<AppConfig>, at: NaiveTime, verbose: bool) -> Result<()> {
    info!("Scheduler started, daily run at {}", at.format("%H:%M"));

    loop {
        let now = Local::now();
        let next = next_run_after(&now, at);
        let wait = (next - now).to_std().unwrap_or_default();
        info!("Next run at {} (in {}s)", next.format("%Y-%m-%d %H:%M:%S"), wait.as_secs());

        tokio::select! {
            () = tokio::time::sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Scheduler stopped");
                return Ok(());
            }
        }

        tokio::select! {
            outcome = run_once(Arc::clone(&config), None, verbose) => match outcome {
                Ok(result) => info!(
                    "Scheduled run produced {} ({})",
                    result.output_path.display(),
                    result.content_kind
                ),
                Err(PipelineError::Configuration(msg)) => {
                    error!("Scheduled run failed [configuration]: {msg}");
                    return Err(PipelineError::Configuration(msg));
                }
                Err(e) if e.is_retryable() => {
                    warn!("Scheduled run failed [{}]: {}; next slot will retry", e.kind(), e);
                }
                Err(e) => error!("Scheduled run failed [{}]: {}", e.kind(), e),
            },
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted during run");
                return Ok(());
            }
        }
    }
}
