//! Exponential-backoff status polling for remote jobs.
//!
//! Remote jobs commonly take 30-120s, so the loop starts with a short
//! interval for fast jobs and backs off geometrically to bound API call
//! volume on long ones, clamped at [`PollOptions::max_interval`]. A
//! wall-clock budget ([`PollOptions::max_total`]) turns a stuck job into
//! a [`PollError::Timeout`], which callers must be able to tell apart
//! from a provider-reported failure.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::api::TripoApiError;
use crate::task::{RemoteJob, TaskStatus};

/// Tunable parameters for the polling loop.
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Delay before the second status query (the first fires immediately).
    pub initial_interval: Duration,
    /// Factor by which the delay grows after each query.
    pub backoff_multiplier: f64,
    /// Upper bound on the delay between queries.
    pub max_interval: Duration,
    /// Wall-clock budget for the whole poll.
    pub max_total: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(5_000),
            backoff_multiplier: 1.5,
            max_interval: Duration::from_millis(30_000),
            max_total: Duration::from_millis(300_000),
        }
    }
}

/// Calculate the next polling interval from the current one.
///
/// The result is clamped to [`PollOptions::max_interval`].
pub fn next_interval(current: Duration, options: &PollOptions) -> Duration {
    let next_ms = (current.as_millis() as f64 * options.backoff_multiplier) as u64;
    Duration::from_millis(next_ms).min(options.max_interval)
}

/// Callback invoked with every job snapshot the poll observes.
pub type ProgressFn<'a> = &'a mut (dyn FnMut(&RemoteJob) + Send);

/// Errors from the polling layer.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// The provider reported a failure-class terminal status. `status`
    /// is retained so callers can distinguish a plain failure from a
    /// content-moderation ban or an expired output.
    #[error("task {task_id} reported {status}: {message}")]
    JobFailed {
        task_id: String,
        status: TaskStatus,
        message: String,
    },

    /// The wall-clock budget elapsed before a terminal status was
    /// observed. The remote job may still be queried later out-of-band.
    #[error("task {task_id} did not reach a terminal status within {budget_ms}ms")]
    Timeout { task_id: String, budget_ms: u64 },

    /// A status query failed at the client layer.
    #[error(transparent)]
    Api(#[from] TripoApiError),
}

/// Drive `status_fn` to a terminal result under time and rate constraints.
///
/// Loops: query status, hand the snapshot to `on_progress`, stop on a
/// terminal status, otherwise sleep for the current interval and grow it
/// via [`next_interval`]. Before each iteration the elapsed wall-clock
/// time is checked against [`PollOptions::max_total`].
///
/// Only `Success` returns normally; `Failed`/`Banned`/`Expired` raise
/// [`PollError::JobFailed`]. After a terminal status is observed,
/// `status_fn` is never called again.
///
/// Each call is independent: concurrent polls for different jobs share
/// no state, and the sleep is a tokio timer, so an in-flight poll never
/// blocks other pipelines.
pub async fn poll_task<F, Fut>(
    task_id: &str,
    mut status_fn: F,
    options: &PollOptions,
    mut on_progress: Option<ProgressFn<'_>>,
) -> Result<RemoteJob, PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<RemoteJob, TripoApiError>>,
{
    let started = Instant::now();
    let mut interval = options.initial_interval;

    loop {
        if started.elapsed() > options.max_total {
            tracing::warn!(
                task_id,
                budget_ms = options.max_total.as_millis() as u64,
                "Poll budget exhausted",
            );
            return Err(PollError::Timeout {
                task_id: task_id.to_string(),
                budget_ms: options.max_total.as_millis() as u64,
            });
        }

        let job = status_fn().await?;
        tracing::debug!(
            task_id,
            status = %job.status,
            progress = job.progress,
            "Polled job status",
        );

        if let Some(cb) = on_progress.as_mut() {
            cb(&job);
        }

        match job.status {
            TaskStatus::Success => return Ok(job),
            status if status.is_failure() => {
                let message = job
                    .error
                    .clone()
                    .unwrap_or_else(|| format!("provider reported {status}"));
                return Err(PollError::JobFailed {
                    task_id: task_id.to_string(),
                    status,
                    message,
                });
            }
            _ => {}
        }

        tokio::time::sleep(interval).await;
        interval = next_interval(interval, options);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
