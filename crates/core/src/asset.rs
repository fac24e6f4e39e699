//! Asset pipeline state: [`PipelineStatus`] and [`AssetRecord`].
//!
//! `PipelineStatus` is the asset-level state machine. It is distinct
//! from any single remote job's status: a job reports what the provider
//! is doing right now, the pipeline status reports how far through the
//! stage graph the asset has progressed.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{AssetId, Timestamp};

// ---------------------------------------------------------------------------
// PipelineStatus
// ---------------------------------------------------------------------------

/// Asset-level pipeline state.
///
/// Transitions are forward-only through the stage graph:
///
/// ```text
/// Queued -> Generating -> Generated -> Rigging -> Rigged -> Animating* -> Complete
///                              \-> Complete (static asset)
///                                   Rigging -> Complete (pre-check: not riggable)
///                                    Rigged -> Complete (rig only, no presets)
/// ```
///
/// Any in-flight state may fall to `Failed`. `Failed` is re-enterable
/// only through an explicit retry, which resumes at the in-progress
/// status of the first incomplete stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Queued,
    Generating,
    Generated,
    Rigging,
    Rigged,
    Animating,
    Complete,
    Failed,
}

impl PipelineStatus {
    /// Whether the pipeline makes no further progress from this state
    /// without an explicit new run or retry.
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStatus::Complete | PipelineStatus::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// `Animating -> Animating` is legal because the animating stage
    /// repeats once per requested preset.
    pub fn can_transition_to(self, next: PipelineStatus) -> bool {
        use PipelineStatus::*;
        match (self, next) {
            // Terminal states never fail "again"; everything else may.
            (Complete | Failed, Failed) => false,
            (_, Failed) => true,
            // Explicit retry re-enters the first incomplete stage.
            (Failed, Generating | Rigging | Animating) => true,
            (Queued, Generating) => true,
            (Generating, Generated) => true,
            (Generated, Rigging | Complete) => true,
            (Rigging, Rigged | Complete) => true,
            (Rigged, Animating | Complete) => true,
            (Animating, Animating | Complete) => true,
            _ => false,
        }
    }

    /// Stable snake_case name, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStatus::Queued => "queued",
            PipelineStatus::Generating => "generating",
            PipelineStatus::Generated => "generated",
            PipelineStatus::Rigging => "rigging",
            PipelineStatus::Rigged => "rigged",
            PipelineStatus::Animating => "animating",
            PipelineStatus::Complete => "complete",
            PipelineStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AssetRecord
// ---------------------------------------------------------------------------

/// Persisted state of one asset's pipeline run.
///
/// Owned by exactly one project. Stage artifacts are referenced by URL
/// only; the pipeline never owns the bytes. Each artifact URL is written
/// at most once (enforced by the store when applying updates) so that
/// results from a completed remote job are treated as final.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub asset_id: AssetId,
    pub project_id: String,

    pub pipeline_status: PipelineStatus,

    /// Rig eligibility, populated by the pre-check stage or supplied by
    /// the caller as a hint. `None` means not yet known.
    pub is_riggable: Option<bool>,

    /// Remote task id of the draft mesh generation job.
    pub draft_task_id: Option<String>,
    /// Artifact URL produced by the draft mesh generation job.
    pub draft_model_url: Option<String>,

    /// Remote task id of the rig-eligibility pre-check job.
    pub prerig_check_task_id: Option<String>,

    /// Remote task id of the rigging job.
    pub rig_task_id: Option<String>,
    /// Artifact URL produced by the rigging job.
    pub rigged_model_url: Option<String>,

    /// Remote task ids of animation retargeting jobs, keyed by preset.
    pub animation_task_ids: BTreeMap<String, String>,
    /// Artifact URLs of retargeted animations, keyed by preset.
    pub animated_model_urls: BTreeMap<String, String>,

    /// Human-readable failure cause, set when `pipeline_status` is
    /// `Failed` and cleared on retry.
    pub error_message: Option<String>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl AssetRecord {
    /// Create a fresh record in the `Queued` state.
    pub fn new(asset_id: impl Into<AssetId>, project_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            asset_id: asset_id.into(),
            project_id: project_id.into(),
            pipeline_status: PipelineStatus::Queued,
            is_riggable: None,
            draft_task_id: None,
            draft_model_url: None,
            prerig_check_task_id: None,
            rig_task_id: None,
            rigged_model_url: None,
            animation_task_ids: BTreeMap::new(),
            animated_model_urls: BTreeMap::new(),
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the draft mesh stage has completed.
    pub fn has_draft_model(&self) -> bool {
        self.draft_model_url.is_some()
    }

    /// Whether the rigging stage has completed.
    pub fn has_rigged_model(&self) -> bool {
        self.rigged_model_url.is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
