//! The task-chain orchestrator.
//!
//! [`PipelineRunner`] drives one asset through the stage graph: draft
//! mesh generation, an optional rig-eligibility pre-check, rigging, and
//! one animation retargeting pass per requested preset. After every
//! stage the result is persisted through [`AssetStore`] before the next
//! stage is submitted, so a crash or failure never loses a completed
//! stage, and a retried run resumes at the first incomplete stage.
//!
//! Failures are terminal for the run: the asset moves to `failed` with
//! the cause recorded, partial results are kept, and nothing is retried
//! until the caller explicitly runs the asset again.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;

use assetforge_core::{new_asset_id, AssetRecord, CoreError, PipelineStatus, Stage};
use assetforge_events::{EventBus, PipelineEvent};
use assetforge_tripo::{
    check_rig_eligibility, generate_mesh, retarget_animation, rig_mesh, JobClient, MeshParams,
    PollOptions, RemoteJob, StageError, StageResult, TaskStatus,
};

use crate::status::AssetStatusView;
use crate::store::{AssetStore, AssetUpdate};

// ---------------------------------------------------------------------------
// PipelineRequest
// ---------------------------------------------------------------------------

/// One asset generation request.
///
/// `rig = false` produces a static asset: the pipeline completes right
/// after mesh generation. Animation presets are only meaningful for
/// rigged assets.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineRequest {
    /// Stable identifier for the asset; minted when the request omits
    /// it.
    #[serde(default = "new_asset_id")]
    pub asset_id: String,
    pub project_id: String,

    /// Text prompt for the draft mesh.
    pub prompt: String,
    /// Optional style-anchor reference image.
    #[serde(default)]
    pub style_image_url: Option<String>,

    /// Whether to rig the generated mesh.
    #[serde(default)]
    pub rig: bool,
    /// Animation presets to retarget onto the rigged mesh.
    #[serde(default)]
    pub animation_presets: Vec<String>,

    /// Caller-supplied rig eligibility. When set, the pre-check stage
    /// is skipped.
    #[serde(default)]
    pub riggable_hint: Option<bool>,
}

impl PipelineRequest {
    /// Validate the request before any remote job is submitted.
    pub fn validate(&self) -> Result<(), CoreError> {
        require("asset_id", &self.asset_id)?;
        require("project_id", &self.project_id)?;
        require("prompt", &self.prompt)?;

        let mut seen = HashSet::new();
        for preset in &self.animation_presets {
            require("animation preset", preset)?;
            if !seen.insert(preset.as_str()) {
                return Err(CoreError::Validation(format!(
                    "duplicate animation preset: {preset}"
                )));
            }
        }

        if !self.rig && !self.animation_presets.is_empty() {
            return Err(CoreError::Validation(
                "animation presets require rig to be enabled".to_string(),
            ));
        }
        Ok(())
    }

    fn mesh_params(&self) -> MeshParams {
        MeshParams {
            prompt: self.prompt.clone(),
            style_image_url: self.style_image_url.clone(),
        }
    }
}

fn require(field: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!("{field} must not be blank")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Errors from pipeline orchestration.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Validation or persistence failure; no stage was harmed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A stage run failed. The asset has been moved to `failed` with
    /// the cause recorded and all earlier stage results kept.
    #[error("stage {stage} failed for asset {asset_id}: {source}")]
    Stage {
        asset_id: String,
        stage: Stage,
        #[source]
        source: StageError,
    },
}

// ---------------------------------------------------------------------------
// PipelineRunner
// ---------------------------------------------------------------------------

/// Drives assets through the generation pipeline.
///
/// Shared via `Arc`: all methods take `&self` and any number of assets
/// may run concurrently against the same runner.
pub struct PipelineRunner {
    client: Arc<dyn JobClient>,
    store: Arc<dyn AssetStore>,
    bus: Arc<EventBus>,
    credential: String,
    poll_options: PollOptions,
}

impl PipelineRunner {
    pub fn new(
        client: Arc<dyn JobClient>,
        store: Arc<dyn AssetStore>,
        bus: Arc<EventBus>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            client,
            store,
            bus,
            credential: credential.into(),
            poll_options: PollOptions::default(),
        }
    }

    /// Override the polling schedule (tests, latency-sensitive callers).
    pub fn with_poll_options(mut self, options: PollOptions) -> Self {
        self.poll_options = options;
        self
    }

    // ---- full pipeline ----

    /// Run the full pipeline for one request.
    ///
    /// Idempotent over completed work: stages whose artifacts are
    /// already persisted are skipped, so calling `run` again after a
    /// failure resumes at the first incomplete stage.
    pub async fn run(&self, request: &PipelineRequest) -> Result<AssetStatusView, PipelineError> {
        request.validate()?;
        let record = self.load_or_create(request).await?;
        if record.pipeline_status == PipelineStatus::Complete {
            return Ok(AssetStatusView::from_record(&record));
        }

        tracing::info!(
            asset_id = %record.asset_id,
            status = %record.pipeline_status,
            rig = request.rig,
            presets = request.animation_presets.len(),
            "Running asset pipeline"
        );

        let record = self.ensure_generated(record, request).await?;
        if !request.rig {
            let record = self.complete(record).await?;
            return Ok(AssetStatusView::from_record(&record));
        }

        let record = self.ensure_rigged(record).await?;
        if record.pipeline_status == PipelineStatus::Complete {
            // Pre-check verdict: not riggable. The draft mesh is the
            // final artifact.
            return Ok(AssetStatusView::from_record(&record));
        }

        let record = self
            .ensure_animated(record, &request.animation_presets)
            .await?;
        let record = self.complete(record).await?;
        Ok(AssetStatusView::from_record(&record))
    }

    // ---- granular operations ----

    /// Run only the draft mesh generation stage.
    pub async fn generate_asset(
        &self,
        request: &PipelineRequest,
    ) -> Result<AssetStatusView, PipelineError> {
        request.validate()?;
        let record = self.load_or_create(request).await?;
        let record = self.ensure_generated(record, request).await?;
        Ok(AssetStatusView::from_record(&record))
    }

    /// Run the rigging stage (with the eligibility pre-check when the
    /// verdict is not yet known) for an already-generated asset.
    pub async fn rig_asset(&self, asset_id: &str) -> Result<AssetStatusView, PipelineError> {
        let record = self.load_existing(asset_id).await?;
        if !record.has_draft_model() {
            return Err(CoreError::Validation(format!(
                "cannot rig asset {asset_id} before mesh generation completes"
            ))
            .into());
        }
        let record = self.ensure_rigged(record).await?;
        Ok(AssetStatusView::from_record(&record))
    }

    /// Retarget animation presets onto an already-rigged asset and
    /// complete the pipeline.
    pub async fn animate_asset(
        &self,
        asset_id: &str,
        presets: &[String],
    ) -> Result<AssetStatusView, PipelineError> {
        let record = self.load_existing(asset_id).await?;
        if !record.has_rigged_model() {
            return Err(CoreError::Validation(format!(
                "cannot animate asset {asset_id} before rigging completes"
            ))
            .into());
        }
        let record = self.ensure_animated(record, presets).await?;
        let record = self.complete(record).await?;
        Ok(AssetStatusView::from_record(&record))
    }

    /// The current status projection for an asset.
    pub async fn status(&self, asset_id: &str) -> Result<AssetStatusView, PipelineError> {
        let record = self.load_existing(asset_id).await?;
        Ok(AssetStatusView::from_record(&record))
    }

    // ---- stage execution ----

    async fn ensure_generated(
        &self,
        record: AssetRecord,
        request: &PipelineRequest,
    ) -> Result<AssetRecord, PipelineError> {
        if record.has_draft_model() {
            return Ok(record);
        }
        let asset_id = record.asset_id.clone();
        self.advance(&asset_id, PipelineStatus::Generating).await?;
        self.bus.publish(PipelineEvent::StageStarted {
            asset_id: asset_id.clone(),
            stage: Stage::MeshGenerate,
            preset: None,
        });

        let mut on_progress = self.progress_publisher(&asset_id, Stage::MeshGenerate, None);
        let result = generate_mesh(
            self.client.as_ref(),
            &self.credential,
            &request.mesh_params(),
            &self.poll_options,
            Some(&mut on_progress),
        )
        .await;
        let result = match result {
            Ok(result) => result,
            Err(source) => {
                return Err(self
                    .fail(&asset_id, Stage::MeshGenerate, None, source)
                    .await)
            }
        };

        let record = self
            .store
            .update(
                &asset_id,
                AssetUpdate::default()
                    .status(PipelineStatus::Generated)
                    .draft_result(&result.task_id, &result.artifact_url),
            )
            .await?;
        self.publish_stage_completed(&asset_id, Stage::MeshGenerate, None, &result);
        Ok(record)
    }

    /// Rig the asset, running the eligibility pre-check first when the
    /// verdict is unknown. A negative verdict completes the pipeline
    /// with the draft mesh as the final artifact.
    async fn ensure_rigged(&self, record: AssetRecord) -> Result<AssetRecord, PipelineError> {
        if record.has_rigged_model() {
            return Ok(record);
        }
        let asset_id = record.asset_id.clone();
        let draft_task_id = record.draft_task_id.clone().ok_or_else(|| {
            CoreError::Internal(format!(
                "asset {asset_id} has a draft model but no draft task id"
            ))
        })?;

        let riggable = match record.is_riggable {
            Some(riggable) => riggable,
            None => {
                self.advance(&asset_id, PipelineStatus::Rigging).await?;
                self.bus.publish(PipelineEvent::StageStarted {
                    asset_id: asset_id.clone(),
                    stage: Stage::PrerigCheck,
                    preset: None,
                });

                let mut on_progress =
                    self.progress_publisher(&asset_id, Stage::PrerigCheck, None);
                let verdict = check_rig_eligibility(
                    self.client.as_ref(),
                    &self.credential,
                    &draft_task_id,
                    &self.poll_options,
                    Some(&mut on_progress),
                )
                .await;
                let verdict = match verdict {
                    Ok(verdict) => verdict,
                    Err(source) => {
                        return Err(self
                            .fail(&asset_id, Stage::PrerigCheck, None, source)
                            .await)
                    }
                };

                self.store
                    .update(
                        &asset_id,
                        AssetUpdate::default()
                            .riggable(verdict.riggable)
                            .prerig_check_task(&verdict.task_id),
                    )
                    .await?;
                self.bus.publish(PipelineEvent::StageCompleted {
                    asset_id: asset_id.clone(),
                    stage: Stage::PrerigCheck,
                    preset: None,
                    task_id: verdict.task_id.clone(),
                    artifact_url: None,
                    duration_ms: verdict.duration.as_millis() as u64,
                });
                verdict.riggable
            }
        };

        if !riggable {
            tracing::info!(asset_id = %asset_id, "Mesh is not riggable, completing with draft");
            let record = self.load_existing(&asset_id).await?;
            return self.complete(record).await;
        }

        self.advance(&asset_id, PipelineStatus::Rigging).await?;
        self.bus.publish(PipelineEvent::StageStarted {
            asset_id: asset_id.clone(),
            stage: Stage::Rig,
            preset: None,
        });

        let mut on_progress = self.progress_publisher(&asset_id, Stage::Rig, None);
        let result = rig_mesh(
            self.client.as_ref(),
            &self.credential,
            &draft_task_id,
            &self.poll_options,
            Some(&mut on_progress),
        )
        .await;
        let result = match result {
            Ok(result) => result,
            Err(source) => return Err(self.fail(&asset_id, Stage::Rig, None, source).await),
        };

        let record = self
            .store
            .update(
                &asset_id,
                AssetUpdate::default()
                    .status(PipelineStatus::Rigged)
                    .rig_result(&result.task_id, &result.artifact_url),
            )
            .await?;
        self.publish_stage_completed(&asset_id, Stage::Rig, None, &result);
        Ok(record)
    }

    /// Retarget every preset that does not already have a persisted
    /// artifact, one at a time, persisting after each.
    async fn ensure_animated(
        &self,
        record: AssetRecord,
        presets: &[String],
    ) -> Result<AssetRecord, PipelineError> {
        let asset_id = record.asset_id.clone();
        let rig_task_id = record.rig_task_id.clone().ok_or_else(|| {
            CoreError::Internal(format!(
                "asset {asset_id} has a rigged model but no rig task id"
            ))
        })?;

        let mut record = record;
        for preset in presets {
            if record.animated_model_urls.contains_key(preset) {
                continue;
            }
            self.advance(&asset_id, PipelineStatus::Animating).await?;
            self.bus.publish(PipelineEvent::StageStarted {
                asset_id: asset_id.clone(),
                stage: Stage::AnimateRetarget,
                preset: Some(preset.clone()),
            });

            let mut on_progress =
                self.progress_publisher(&asset_id, Stage::AnimateRetarget, Some(preset.clone()));
            let result = retarget_animation(
                self.client.as_ref(),
                &self.credential,
                &rig_task_id,
                preset,
                &self.poll_options,
                Some(&mut on_progress),
            )
            .await;
            let result = match result {
                Ok(result) => result,
                Err(source) => {
                    return Err(self
                        .fail(&asset_id, Stage::AnimateRetarget, Some(preset.clone()), source)
                        .await)
                }
            };

            record = self
                .store
                .update(
                    &asset_id,
                    AssetUpdate::default().animation_result(
                        preset,
                        &result.task_id,
                        &result.artifact_url,
                    ),
                )
                .await?;
            self.publish_stage_completed(
                &asset_id,
                Stage::AnimateRetarget,
                Some(preset.clone()),
                &result,
            );
        }
        Ok(record)
    }

    // ---- helpers ----

    async fn load_or_create(
        &self,
        request: &PipelineRequest,
    ) -> Result<AssetRecord, PipelineError> {
        if let Some(record) = self.store.load(&request.asset_id).await? {
            return Ok(record);
        }
        let mut record = AssetRecord::new(request.asset_id.clone(), request.project_id.clone());
        record.is_riggable = request.riggable_hint;
        self.store.insert(record.clone()).await?;
        Ok(record)
    }

    async fn load_existing(&self, asset_id: &str) -> Result<AssetRecord, PipelineError> {
        self.store
            .load(asset_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "asset",
                    id: asset_id.to_string(),
                }
                .into()
            })
    }

    /// Move the asset to `next`, clearing any stale failure message.
    /// A no-op when the record is already in `next`.
    async fn advance(&self, asset_id: &str, next: PipelineStatus) -> Result<AssetRecord, CoreError> {
        self.store
            .update(
                asset_id,
                AssetUpdate::default().status(next).clear_error(),
            )
            .await
    }

    /// Mark the pipeline complete and announce it.
    async fn complete(&self, record: AssetRecord) -> Result<AssetRecord, PipelineError> {
        let record = if record.pipeline_status == PipelineStatus::Complete {
            record
        } else {
            self.advance(&record.asset_id, PipelineStatus::Complete)
                .await?
        };
        tracing::info!(asset_id = %record.asset_id, "Asset pipeline complete");
        self.bus.publish(PipelineEvent::PipelineCompleted {
            asset_id: record.asset_id.clone(),
        });
        Ok(record)
    }

    /// Persist the failure, announce it, and build the caller error.
    ///
    /// Earlier stage results stay on the record; only the status and
    /// the failure message change.
    async fn fail(
        &self,
        asset_id: &str,
        stage: Stage,
        preset: Option<String>,
        source: StageError,
    ) -> PipelineError {
        let message = source.to_string();
        tracing::warn!(
            asset_id = %asset_id,
            stage = %stage,
            error = %message,
            "Pipeline stage failed"
        );
        if let Err(store_err) = self
            .store
            .update(
                asset_id,
                AssetUpdate::default()
                    .status(PipelineStatus::Failed)
                    .error(&message),
            )
            .await
        {
            tracing::error!(
                asset_id = %asset_id,
                error = %store_err,
                "Could not persist pipeline failure"
            );
        }
        self.bus.publish(PipelineEvent::PipelineFailed {
            asset_id: asset_id.to_string(),
            stage,
            preset,
            error: message,
        });
        PipelineError::Stage {
            asset_id: asset_id.to_string(),
            stage,
            source,
        }
    }

    fn progress_publisher(
        &self,
        asset_id: &str,
        stage: Stage,
        preset: Option<String>,
    ) -> impl FnMut(&RemoteJob) + Send {
        let bus = Arc::clone(&self.bus);
        let asset_id = asset_id.to_string();
        move |job: &RemoteJob| {
            if job.status != TaskStatus::Running {
                return;
            }
            if let Some(percent) = job.progress {
                bus.publish(PipelineEvent::StageProgress {
                    asset_id: asset_id.clone(),
                    stage,
                    preset: preset.clone(),
                    percent,
                });
            }
        }
    }

    fn publish_stage_completed(
        &self,
        asset_id: &str,
        stage: Stage,
        preset: Option<String>,
        result: &StageResult,
    ) {
        tracing::info!(
            asset_id = %asset_id,
            stage = %stage,
            task_id = %result.task_id,
            duration_ms = result.duration.as_millis() as u64,
            "Pipeline stage completed"
        );
        self.bus.publish(PipelineEvent::StageCompleted {
            asset_id: asset_id.to_string(),
            stage,
            preset,
            task_id: result.task_id.clone(),
            artifact_url: Some(result.artifact_url.clone()),
            duration_ms: result.duration.as_millis() as u64,
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
