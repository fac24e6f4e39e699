//! Pipeline stage functions: submit a job, poll it to completion,
//! extract the artifact.
//!
//! Every stage has the same shape and the same error discipline: submit
//! errors surface as [`StageError::Api`], polling errors propagate
//! unchanged as [`StageError::Poll`] (so the orchestrator can tell a
//! timeout from a provider-reported failure), and a success without a
//! usable artifact is the hard error [`StageError::MissingOutput`].
//!
//! Each stage also has a non-blocking `submit_*` variant for callers
//! that run their own polling orchestration (batch status refresh).

use std::time::{Duration, Instant};

use crate::api::{JobClient, JobRequest, TripoApiError};
use crate::poll::{poll_task, PollError, PollOptions, ProgressFn};
use crate::task::{
    extract_artifact_url, OutputField, RemoteJob, MESH_OUTPUT_PRIORITY, RIGGED_OUTPUT_PRIORITY,
};

/// Errors from a stage run.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// Job submission failed at the client layer.
    #[error(transparent)]
    Api(#[from] TripoApiError),

    /// Polling ended in a failure-class status, a timeout, or a
    /// transport error.
    #[error(transparent)]
    Poll(#[from] PollError),

    /// The provider reported success but populated no known output
    /// field. Never silently proceed past this.
    #[error("task {task_id} succeeded but produced no usable artifact")]
    MissingOutput { task_id: String },
}

/// Outcome of a completed stage.
#[derive(Debug, Clone)]
pub struct StageResult {
    /// Remote task id that produced the artifact.
    pub task_id: String,
    /// URL of the stage's artifact.
    pub artifact_url: String,
    /// Wall-clock time from submission to terminal status.
    pub duration: Duration,
}

/// Outcome of the rig-eligibility pre-check stage.
#[derive(Debug, Clone)]
pub struct PrerigCheckResult {
    pub task_id: String,
    /// Whether the draft mesh can be rigged.
    pub riggable: bool,
    pub duration: Duration,
}

/// Inputs for the draft mesh generation stage.
#[derive(Debug, Clone)]
pub struct MeshParams {
    pub prompt: String,
    /// Optional style-anchor reference image.
    pub style_image_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Shared submit -> poll -> extract core
// ---------------------------------------------------------------------------

async fn run_to_artifact(
    client: &dyn JobClient,
    credential: &str,
    request: JobRequest,
    priority: &[OutputField],
    options: &PollOptions,
    on_progress: Option<ProgressFn<'_>>,
) -> Result<StageResult, StageError> {
    let started = Instant::now();
    let job = client.submit(credential, &request).await?;
    let task_id = job.task_id.clone();

    let done = poll_task(
        &task_id,
        || client.get_status(credential, &task_id),
        options,
        on_progress,
    )
    .await?;

    let artifact_url =
        extract_artifact_url(done.output.as_ref(), priority).map_err(|_| {
            StageError::MissingOutput {
                task_id: task_id.clone(),
            }
        })?;

    Ok(StageResult {
        task_id,
        artifact_url,
        duration: started.elapsed(),
    })
}

// ---------------------------------------------------------------------------
// Mesh generation
// ---------------------------------------------------------------------------

/// Submit a draft mesh generation job without waiting for it.
pub async fn submit_mesh_generation(
    client: &dyn JobClient,
    credential: &str,
    params: &MeshParams,
) -> Result<RemoteJob, TripoApiError> {
    client
        .submit(
            credential,
            &JobRequest::TextToModel {
                prompt: params.prompt.clone(),
                style_image_url: params.style_image_url.clone(),
            },
        )
        .await
}

/// Generate a draft mesh and wait for its artifact.
///
/// Prefers the textured PBR output over the draft model when both are
/// present.
pub async fn generate_mesh(
    client: &dyn JobClient,
    credential: &str,
    params: &MeshParams,
    options: &PollOptions,
    on_progress: Option<ProgressFn<'_>>,
) -> Result<StageResult, StageError> {
    run_to_artifact(
        client,
        credential,
        JobRequest::TextToModel {
            prompt: params.prompt.clone(),
            style_image_url: params.style_image_url.clone(),
        },
        MESH_OUTPUT_PRIORITY,
        options,
        on_progress,
    )
    .await
}

// ---------------------------------------------------------------------------
// Rig-eligibility pre-check
// ---------------------------------------------------------------------------

/// Submit a rig-eligibility pre-check without waiting for it.
pub async fn submit_rig_eligibility_check(
    client: &dyn JobClient,
    credential: &str,
    draft_task_id: &str,
) -> Result<RemoteJob, TripoApiError> {
    client
        .submit(
            credential,
            &JobRequest::AnimatePrerigCheck {
                original_model_task_id: draft_task_id.to_string(),
            },
        )
        .await
}

/// Check whether a generated mesh can be rigged.
///
/// The stage's "artifact" is the `riggable` verdict; a success without
/// one is [`StageError::MissingOutput`].
pub async fn check_rig_eligibility(
    client: &dyn JobClient,
    credential: &str,
    draft_task_id: &str,
    options: &PollOptions,
    on_progress: Option<ProgressFn<'_>>,
) -> Result<PrerigCheckResult, StageError> {
    let started = Instant::now();
    let job = submit_rig_eligibility_check(client, credential, draft_task_id).await?;
    let task_id = job.task_id.clone();

    let done = poll_task(
        &task_id,
        || client.get_status(credential, &task_id),
        options,
        on_progress,
    )
    .await?;

    let riggable = done
        .output
        .as_ref()
        .and_then(|output| output.riggable)
        .ok_or_else(|| StageError::MissingOutput {
            task_id: task_id.clone(),
        })?;

    Ok(PrerigCheckResult {
        task_id,
        riggable,
        duration: started.elapsed(),
    })
}

// ---------------------------------------------------------------------------
// Rigging
// ---------------------------------------------------------------------------

/// Submit a rigging job without waiting for it.
pub async fn submit_rig(
    client: &dyn JobClient,
    credential: &str,
    draft_task_id: &str,
) -> Result<RemoteJob, TripoApiError> {
    client
        .submit(
            credential,
            &JobRequest::AnimateRig {
                original_model_task_id: draft_task_id.to_string(),
            },
        )
        .await
}

/// Rig a draft mesh and wait for the rigged model artifact.
pub async fn rig_mesh(
    client: &dyn JobClient,
    credential: &str,
    draft_task_id: &str,
    options: &PollOptions,
    on_progress: Option<ProgressFn<'_>>,
) -> Result<StageResult, StageError> {
    run_to_artifact(
        client,
        credential,
        JobRequest::AnimateRig {
            original_model_task_id: draft_task_id.to_string(),
        },
        RIGGED_OUTPUT_PRIORITY,
        options,
        on_progress,
    )
    .await
}

// ---------------------------------------------------------------------------
// Animation retargeting
// ---------------------------------------------------------------------------

/// Submit an animation retargeting job without waiting for it.
pub async fn submit_retarget(
    client: &dyn JobClient,
    credential: &str,
    rig_task_id: &str,
    preset: &str,
) -> Result<RemoteJob, TripoApiError> {
    client
        .submit(
            credential,
            &JobRequest::AnimateRetarget {
                original_model_task_id: rig_task_id.to_string(),
                animation: preset.to_string(),
            },
        )
        .await
}

/// Retarget one animation preset onto a rigged mesh and wait for the
/// animated model artifact.
pub async fn retarget_animation(
    client: &dyn JobClient,
    credential: &str,
    rig_task_id: &str,
    preset: &str,
    options: &PollOptions,
    on_progress: Option<ProgressFn<'_>>,
) -> Result<StageResult, StageError> {
    run_to_artifact(
        client,
        credential,
        JobRequest::AnimateRetarget {
            original_model_task_id: rig_task_id.to_string(),
            animation: preset.to_string(),
        },
        RIGGED_OUTPUT_PRIORITY,
        options,
        on_progress,
    )
    .await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
