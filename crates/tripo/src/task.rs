//! Provider task types and output extraction.
//!
//! The provider reports each remote job as JSON of the shape
//! `{task_id, type, status, progress, output{model:{url}, pbr_model:
//! <string|{url}>, riggable}, error}`. This module deserializes that into
//! a strongly-typed [`RemoteJob`]. Status and type are closed enums:
//! unrecognized wire values are a deserialization error at the boundary,
//! never a silent fall-through.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Job type and status
// ---------------------------------------------------------------------------

/// All known remote job types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Draft mesh generation from a text prompt.
    TextToModel,
    /// Rig-eligibility check on a previously generated mesh.
    AnimatePrerigCheck,
    /// Skeleton rigging of a previously generated mesh.
    AnimateRig,
    /// Retargeting of one animation preset onto a rigged mesh.
    AnimateRetarget,
}

impl JobType {
    /// Stable snake_case name, matching the wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::TextToModel => "text_to_model",
            JobType::AnimatePrerigCheck => "animate_prerig_check",
            JobType::AnimateRig => "animate_rig",
            JobType::AnimateRetarget => "animate_retarget",
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-reported job status.
///
/// `Queued` and `Running` are the only non-terminal states. `Banned`
/// (content moderation) and `Expired` (output retention elapsed) are
/// failure-class terminal states distinct from a plain `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Success,
    Failed,
    Banned,
    Expired,
}

impl TaskStatus {
    /// Whether the provider will make no further progress on this job.
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Queued | TaskStatus::Running)
    }

    /// Whether this is a failure-class terminal status.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            TaskStatus::Failed | TaskStatus::Banned | TaskStatus::Expired
        )
    }

    /// Stable snake_case name, matching the wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
            TaskStatus::Banned => "banned",
            TaskStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RemoteJob
// ---------------------------------------------------------------------------

/// One unit of remote work, as reported by the provider.
///
/// Created by a submit call with status `Queued`, refreshed only by
/// re-fetching status from the provider, and immutable once a terminal
/// status has been observed.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteJob {
    pub task_id: String,

    #[serde(rename = "type")]
    pub job_type: JobType,

    pub status: TaskStatus,

    /// 0-100, only meaningful while `status` is `Running`.
    #[serde(default)]
    pub progress: Option<u8>,

    /// Artifact descriptor, populated only on `Success`.
    #[serde(default)]
    pub output: Option<TaskOutput>,

    /// Human-readable message, populated on failure-class statuses.
    #[serde(default)]
    pub error: Option<String>,
}

impl RemoteJob {
    /// A freshly submitted job: queued, no progress, no output.
    pub fn queued(task_id: impl Into<String>, job_type: JobType) -> Self {
        Self {
            task_id: task_id.into(),
            job_type,
            status: TaskStatus::Queued,
            progress: None,
            output: None,
            error: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Task output
// ---------------------------------------------------------------------------

/// Named artifact URLs produced by a successful job.
///
/// All fields are optional on the wire; which ones are populated depends
/// on the job type and the provider version.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskOutput {
    /// Draft (untextured) model output.
    #[serde(default)]
    pub model: Option<ModelRef>,

    /// Textured PBR model output. Legacy responses carry a plain URL
    /// string here instead of an object.
    #[serde(default)]
    pub pbr_model: Option<PbrModelRef>,

    /// Rig eligibility verdict, populated by pre-check jobs.
    #[serde(default)]
    pub riggable: Option<bool>,
}

/// An artifact reference of the form `{"url": "..."}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelRef {
    pub url: String,
}

/// The `pbr_model` field: either a bare URL string (legacy) or a
/// `{"url": "..."}` object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PbrModelRef {
    Url(String),
    Object(ModelRef),
}

impl PbrModelRef {
    pub fn url(&self) -> &str {
        match self {
            PbrModelRef::Url(url) => url,
            PbrModelRef::Object(model) => &model.url,
        }
    }
}

// ---------------------------------------------------------------------------
// Artifact extraction
// ---------------------------------------------------------------------------

/// A named output field that may hold an artifact URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputField {
    PbrModel,
    Model,
}

/// Extraction priority for mesh generation: prefer the textured PBR
/// output, fall back to the draft model.
pub const MESH_OUTPUT_PRIORITY: &[OutputField] = &[OutputField::PbrModel, OutputField::Model];

/// Extraction priority for rigging and retargeting: the result lands in
/// `model`.
pub const RIGGED_OUTPUT_PRIORITY: &[OutputField] = &[OutputField::Model, OutputField::PbrModel];

/// Raised when a job reported success but populated no known output
/// field. Treated as a hard error by every stage.
#[derive(Debug, thiserror::Error)]
#[error("no usable artifact in task output")]
pub struct MissingOutput;

/// Pick the first populated output field in `priority` order.
///
/// Pure and idempotent: the same output and priority always yield the
/// same URL.
pub fn extract_artifact_url(
    output: Option<&TaskOutput>,
    priority: &[OutputField],
) -> Result<String, MissingOutput> {
    let output = output.ok_or(MissingOutput)?;
    for field in priority {
        let url = match field {
            OutputField::PbrModel => output.pbr_model.as_ref().map(|m| m.url()),
            OutputField::Model => output.model.as_ref().map(|m| m.url.as_str()),
        };
        match url {
            Some(url) if !url.is_empty() => return Ok(url.to_string()),
            _ => {}
        }
    }
    Err(MissingOutput)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> RemoteJob {
        serde_json::from_str(json).unwrap()
    }

    // -- deserialization --

    #[test]
    fn parse_running_job_with_progress() {
        let job = parse(
            r#"{"task_id":"t1","type":"text_to_model","status":"running","progress":40}"#,
        );
        assert_eq!(job.task_id, "t1");
        assert_eq!(job.job_type, JobType::TextToModel);
        assert_eq!(job.status, TaskStatus::Running);
        assert_eq!(job.progress, Some(40));
        assert!(job.output.is_none());
    }

    #[test]
    fn parse_success_with_model_output() {
        let job = parse(
            r#"{"task_id":"t1","type":"animate_rig","status":"success",
                "output":{"model":{"url":"https://x/a.glb"}}}"#,
        );
        assert_eq!(job.status, TaskStatus::Success);
        let output = job.output.unwrap();
        assert_eq!(output.model.unwrap().url, "https://x/a.glb");
        assert!(output.pbr_model.is_none());
    }

    #[test]
    fn parse_pbr_model_as_object() {
        let job = parse(
            r#"{"task_id":"t1","type":"text_to_model","status":"success",
                "output":{"pbr_model":{"url":"https://x/pbr.glb"}}}"#,
        );
        let output = job.output.unwrap();
        assert_eq!(output.pbr_model.unwrap().url(), "https://x/pbr.glb");
    }

    #[test]
    fn parse_pbr_model_as_legacy_string() {
        let job = parse(
            r#"{"task_id":"t1","type":"text_to_model","status":"success",
                "output":{"pbr_model":"https://x/pbr.glb"}}"#,
        );
        let output = job.output.unwrap();
        assert_eq!(output.pbr_model.unwrap().url(), "https://x/pbr.glb");
    }

    #[test]
    fn parse_failed_job_with_error() {
        let job = parse(
            r#"{"task_id":"t1","type":"text_to_model","status":"failed",
                "error":"content violation"}"#,
        );
        assert_eq!(job.status, TaskStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("content violation"));
    }

    #[test]
    fn parse_prerig_check_riggable_output() {
        let job = parse(
            r#"{"task_id":"t1","type":"animate_prerig_check","status":"success",
                "output":{"riggable":false}}"#,
        );
        assert_eq!(job.output.unwrap().riggable, Some(false));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let result: Result<RemoteJob, _> = serde_json::from_str(
            r#"{"task_id":"t1","type":"text_to_model","status":"paused"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn unknown_job_type_is_rejected() {
        let result: Result<RemoteJob, _> = serde_json::from_str(
            r#"{"task_id":"t1","type":"image_to_video","status":"queued"}"#,
        );
        assert!(result.is_err());
    }

    // -- status classification --

    #[test]
    fn terminal_and_failure_classification() {
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        for status in [
            TaskStatus::Success,
            TaskStatus::Failed,
            TaskStatus::Banned,
            TaskStatus::Expired,
        ] {
            assert!(status.is_terminal(), "{status} should be terminal");
        }
        assert!(!TaskStatus::Success.is_failure());
        assert!(TaskStatus::Failed.is_failure());
        assert!(TaskStatus::Banned.is_failure());
        assert!(TaskStatus::Expired.is_failure());
    }

    // -- extraction --

    fn output_with(pbr: Option<PbrModelRef>, model: Option<&str>) -> TaskOutput {
        TaskOutput {
            model: model.map(|url| ModelRef {
                url: url.to_string(),
            }),
            pbr_model: pbr,
            riggable: None,
        }
    }

    #[test]
    fn mesh_extraction_prefers_pbr_over_draft() {
        let output = output_with(
            Some(PbrModelRef::Url("https://x/pbr.glb".into())),
            Some("https://x/draft.glb"),
        );
        let url = extract_artifact_url(Some(&output), MESH_OUTPUT_PRIORITY).unwrap();
        assert_eq!(url, "https://x/pbr.glb");
    }

    #[test]
    fn mesh_extraction_falls_back_to_draft() {
        let output = output_with(None, Some("https://x/draft.glb"));
        let url = extract_artifact_url(Some(&output), MESH_OUTPUT_PRIORITY).unwrap();
        assert_eq!(url, "https://x/draft.glb");
    }

    #[test]
    fn rigged_extraction_prefers_model() {
        let output = output_with(
            Some(PbrModelRef::Url("https://x/pbr.glb".into())),
            Some("https://x/rigged.glb"),
        );
        let url = extract_artifact_url(Some(&output), RIGGED_OUTPUT_PRIORITY).unwrap();
        assert_eq!(url, "https://x/rigged.glb");
    }

    #[test]
    fn extraction_is_idempotent() {
        let output = output_with(Some(PbrModelRef::Url("https://x/pbr.glb".into())), None);
        let first = extract_artifact_url(Some(&output), MESH_OUTPUT_PRIORITY).unwrap();
        let second = extract_artifact_url(Some(&output), MESH_OUTPUT_PRIORITY).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_output_is_missing() {
        assert!(extract_artifact_url(None, MESH_OUTPUT_PRIORITY).is_err());
        let output = output_with(None, None);
        assert!(extract_artifact_url(Some(&output), MESH_OUTPUT_PRIORITY).is_err());
    }

    #[test]
    fn empty_url_string_is_missing() {
        let output = output_with(Some(PbrModelRef::Url(String::new())), None);
        assert!(extract_artifact_url(Some(&output), MESH_OUTPUT_PRIORITY).is_err());
    }
}
