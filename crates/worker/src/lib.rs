//! Batch pipeline worker.
//!
//! Runs a set of [`PipelineRequest`]s concurrently against one shared
//! [`PipelineRunner`]. Each asset's pipeline is an independent task;
//! one asset failing never stops the others. A [`CancellationToken`]
//! aborts in-flight pipelines on shutdown.

pub mod config;

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use assetforge_pipeline::{AssetStatusView, PipelineError, PipelineRequest, PipelineRunner};

pub use config::{ConfigError, WorkerConfig};

/// Run every request to completion (or failure) and collect the
/// outcomes.
///
/// Cancelled pipelines are logged and omitted from the result; their
/// persisted per-stage progress is still in the store and a later run
/// resumes from it.
pub async fn run_batch(
    runner: Arc<PipelineRunner>,
    requests: Vec<PipelineRequest>,
    cancel: CancellationToken,
) -> Vec<(String, Result<AssetStatusView, PipelineError>)> {
    let mut tasks = JoinSet::new();
    for request in requests {
        let runner = Arc::clone(&runner);
        let cancel = cancel.clone();
        tasks.spawn(async move {
            let asset_id = request.asset_id.clone();
            tokio::select! {
                result = runner.run(&request) => Some((asset_id, result)),
                () = cancel.cancelled() => {
                    tracing::warn!(asset_id = %asset_id, "Pipeline cancelled before completion");
                    None
                }
            }
        });
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(outcome)) => outcomes.push(outcome),
            Ok(None) => {}
            Err(join_err) => {
                tracing::error!(error = %join_err, "Pipeline task panicked");
            }
        }
    }
    outcomes
}
