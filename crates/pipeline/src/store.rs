//! Persistence seam for asset records.
//!
//! The pipeline consumes persistence through the narrow [`AssetStore`]
//! contract: load a record, insert a record, apply one atomic partial
//! update. [`AssetUpdate::apply_to`] enforces the record invariants
//! (forward-only status transitions, write-once artifacts) so every
//! store backend gets them for free. [`MemoryStore`] is the in-process
//! implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use assetforge_core::{AssetRecord, CoreError, PipelineStatus};

// ---------------------------------------------------------------------------
// AssetUpdate
// ---------------------------------------------------------------------------

/// One atomic partial update to an asset record.
///
/// Unset fields are left untouched. Built with the chained setters so
/// orchestration code reads as one statement per stage transition.
#[derive(Debug, Default, Clone)]
pub struct AssetUpdate {
    pipeline_status: Option<PipelineStatus>,
    is_riggable: Option<bool>,
    draft_task_id: Option<String>,
    draft_model_url: Option<String>,
    prerig_check_task_id: Option<String>,
    rig_task_id: Option<String>,
    rigged_model_url: Option<String>,
    animation_result: Option<(String, String, String)>,
    error_message: Option<Option<String>>,
}

impl AssetUpdate {
    /// Advance the pipeline status.
    pub fn status(mut self, status: PipelineStatus) -> Self {
        self.pipeline_status = Some(status);
        self
    }

    /// Record the rig-eligibility verdict.
    pub fn riggable(mut self, riggable: bool) -> Self {
        self.is_riggable = Some(riggable);
        self
    }

    /// Record the draft mesh stage result.
    pub fn draft_result(mut self, task_id: impl Into<String>, url: impl Into<String>) -> Self {
        self.draft_task_id = Some(task_id.into());
        self.draft_model_url = Some(url.into());
        self
    }

    /// Record the pre-check task id.
    pub fn prerig_check_task(mut self, task_id: impl Into<String>) -> Self {
        self.prerig_check_task_id = Some(task_id.into());
        self
    }

    /// Record the rigging stage result.
    pub fn rig_result(mut self, task_id: impl Into<String>, url: impl Into<String>) -> Self {
        self.rig_task_id = Some(task_id.into());
        self.rigged_model_url = Some(url.into());
        self
    }

    /// Record one animation preset's retargeting result.
    pub fn animation_result(
        mut self,
        preset: impl Into<String>,
        task_id: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        self.animation_result = Some((preset.into(), task_id.into(), url.into()));
        self
    }

    /// Set the failure message.
    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(Some(message.into()));
        self
    }

    /// Clear any previous failure message (retry).
    pub fn clear_error(mut self) -> Self {
        self.error_message = Some(None);
        self
    }

    /// Apply this update to a record, enforcing the record invariants.
    ///
    /// - Status changes must be legal per
    ///   [`PipelineStatus::can_transition_to`].
    /// - Artifact URLs and task ids are write-once: overwriting an
    ///   existing value with a different one is a [`CoreError::Conflict`].
    ///   Re-writing the same value is an idempotent no-op.
    pub fn apply_to(&self, record: &mut AssetRecord) -> Result<(), CoreError> {
        // Validate everything first, mutate only after every check has
        // passed: a rejected update must leave the record untouched.
        if let Some(next) = self.pipeline_status {
            if next != record.pipeline_status && !record.pipeline_status.can_transition_to(next) {
                return Err(CoreError::Conflict(format!(
                    "illegal status transition {} -> {} for asset {}",
                    record.pipeline_status, next, record.asset_id
                )));
            }
        }
        for (slot, value, field) in [
            (&record.draft_task_id, &self.draft_task_id, "draft_task_id"),
            (
                &record.draft_model_url,
                &self.draft_model_url,
                "draft_model_url",
            ),
            (
                &record.prerig_check_task_id,
                &self.prerig_check_task_id,
                "prerig_check_task_id",
            ),
            (&record.rig_task_id, &self.rig_task_id, "rig_task_id"),
            (
                &record.rigged_model_url,
                &self.rigged_model_url,
                "rigged_model_url",
            ),
        ] {
            check_once(slot, value.as_deref(), field, &record.asset_id)?;
        }
        if let Some((preset, _, url)) = &self.animation_result {
            if let Some(existing) = record.animated_model_urls.get(preset) {
                if existing != url {
                    return Err(CoreError::Conflict(format!(
                        "animated_model_urls[{preset}] is already set for asset {}",
                        record.asset_id
                    )));
                }
            }
        }

        if let Some(next) = self.pipeline_status {
            record.pipeline_status = next;
        }
        if let Some(riggable) = self.is_riggable {
            record.is_riggable = Some(riggable);
        }
        commit_once(&mut record.draft_task_id, &self.draft_task_id);
        commit_once(&mut record.draft_model_url, &self.draft_model_url);
        commit_once(
            &mut record.prerig_check_task_id,
            &self.prerig_check_task_id,
        );
        commit_once(&mut record.rig_task_id, &self.rig_task_id);
        commit_once(&mut record.rigged_model_url, &self.rigged_model_url);
        if let Some((preset, task_id, url)) = &self.animation_result {
            record
                .animation_task_ids
                .insert(preset.clone(), task_id.clone());
            record.animated_model_urls.insert(preset.clone(), url.clone());
        }
        if let Some(message) = &self.error_message {
            record.error_message = message.clone();
        }
        record.updated_at = Utc::now();
        Ok(())
    }
}

/// Write-once check: an already-set field may only be re-set to the same
/// value.
fn check_once(
    slot: &Option<String>,
    value: Option<&str>,
    field: &str,
    asset_id: &str,
) -> Result<(), CoreError> {
    match (slot.as_deref(), value) {
        (Some(existing), Some(value)) if existing != value => Err(CoreError::Conflict(format!(
            "{field} is already set for asset {asset_id}"
        ))),
        _ => Ok(()),
    }
}

/// Fill an unset field; an already-set one keeps its (checked-equal)
/// value.
fn commit_once(slot: &mut Option<String>, value: &Option<String>) {
    if slot.is_none() && value.is_some() {
        slot.clone_from(value);
    }
}

// ---------------------------------------------------------------------------
// AssetStore
// ---------------------------------------------------------------------------

/// Narrow persistence contract the orchestrator depends on.
///
/// Each call is atomic. Implementations must serialize updates per
/// asset so two concurrent stage-completions cannot interleave within
/// one record.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Fetch a record, or `None` if the asset is unknown.
    async fn load(&self, asset_id: &str) -> Result<Option<AssetRecord>, CoreError>;

    /// Create a record. Fails with [`CoreError::Conflict`] if the asset
    /// already exists.
    async fn insert(&self, record: AssetRecord) -> Result<(), CoreError>;

    /// Apply one partial update and return the updated record. Fails
    /// with [`CoreError::NotFound`] if the asset is unknown.
    async fn update(&self, asset_id: &str, update: AssetUpdate) -> Result<AssetRecord, CoreError>;
}

/// In-memory [`AssetStore`] backed by a `tokio::sync::RwLock`.
///
/// The write lock makes every update atomic and single-writer; reads
/// proceed concurrently.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, AssetRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssetStore for MemoryStore {
    async fn load(&self, asset_id: &str) -> Result<Option<AssetRecord>, CoreError> {
        Ok(self.records.read().await.get(asset_id).cloned())
    }

    async fn insert(&self, record: AssetRecord) -> Result<(), CoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.asset_id) {
            return Err(CoreError::Conflict(format!(
                "asset {} already exists",
                record.asset_id
            )));
        }
        records.insert(record.asset_id.clone(), record);
        Ok(())
    }

    async fn update(&self, asset_id: &str, update: AssetUpdate) -> Result<AssetRecord, CoreError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(asset_id).ok_or(CoreError::NotFound {
            entity: "asset",
            id: asset_id.to_string(),
        })?;
        update.apply_to(record)?;
        Ok(record.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    async fn store_with_asset() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert(AssetRecord::new("asset-1", "project-1"))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn insert_then_load_round_trips() {
        let store = MemoryStore::new();
        let record = AssetRecord::new("asset-1", "project-1");
        store.insert(record.clone()).await.unwrap();

        let loaded = store.load("asset-1").await.unwrap().unwrap();
        assert_eq!(loaded.asset_id, "asset-1");
        assert_eq!(loaded.pipeline_status, PipelineStatus::Queued);
    }

    #[tokio::test]
    async fn duplicate_insert_conflicts() {
        let store = store_with_asset().await;
        let err = store
            .insert(AssetRecord::new("asset-1", "project-1"))
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Conflict(_));
    }

    #[tokio::test]
    async fn update_unknown_asset_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update("ghost", AssetUpdate::default())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::NotFound { entity: "asset", .. });
    }

    #[tokio::test]
    async fn partial_update_leaves_other_fields() {
        let store = store_with_asset().await;
        store
            .update(
                "asset-1",
                AssetUpdate::default().status(PipelineStatus::Generating),
            )
            .await
            .unwrap();
        let record = store
            .update(
                "asset-1",
                AssetUpdate::default()
                    .status(PipelineStatus::Generated)
                    .draft_result("t1", "https://x/a.glb"),
            )
            .await
            .unwrap();

        assert_eq!(record.pipeline_status, PipelineStatus::Generated);
        assert_eq!(record.draft_task_id.as_deref(), Some("t1"));
        assert_eq!(record.project_id, "project-1");
        assert!(record.rigged_model_url.is_none());
    }

    #[tokio::test]
    async fn illegal_transition_is_rejected() {
        let store = store_with_asset().await;
        let err = store
            .update(
                "asset-1",
                AssetUpdate::default().status(PipelineStatus::Rigged),
            )
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Conflict(_));

        // The record is untouched by the rejected update.
        let record = store.load("asset-1").await.unwrap().unwrap();
        assert_eq!(record.pipeline_status, PipelineStatus::Queued);
    }

    #[tokio::test]
    async fn artifact_overwrite_is_rejected() {
        let store = store_with_asset().await;
        store
            .update(
                "asset-1",
                AssetUpdate::default()
                    .status(PipelineStatus::Generating)
                    .clear_error(),
            )
            .await
            .unwrap();
        store
            .update(
                "asset-1",
                AssetUpdate::default()
                    .status(PipelineStatus::Generated)
                    .draft_result("t1", "https://x/a.glb"),
            )
            .await
            .unwrap();

        let err = store
            .update(
                "asset-1",
                AssetUpdate::default().draft_result("t2", "https://x/other.glb"),
            )
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Conflict(_));
    }

    #[tokio::test]
    async fn conflicting_update_leaves_record_untouched() {
        let store = store_with_asset().await;
        store
            .update(
                "asset-1",
                AssetUpdate::default().rig_result("r0", "https://x/rigged.glb"),
            )
            .await
            .unwrap();

        // Conflicts on the rig result; the fresh draft fields must not
        // be persisted either.
        let err = store
            .update(
                "asset-1",
                AssetUpdate::default()
                    .draft_result("d1", "https://x/draft.glb")
                    .rig_result("r1", "https://x/other.glb"),
            )
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Conflict(_));

        let record = store.load("asset-1").await.unwrap().unwrap();
        assert!(record.draft_task_id.is_none());
        assert!(record.draft_model_url.is_none());
        assert_eq!(record.rig_task_id.as_deref(), Some("r0"));
        assert_eq!(
            record.rigged_model_url.as_deref(),
            Some("https://x/rigged.glb")
        );
    }

    #[tokio::test]
    async fn rewriting_same_artifact_is_idempotent() {
        let store = store_with_asset().await;
        store
            .update(
                "asset-1",
                AssetUpdate::default().status(PipelineStatus::Generating),
            )
            .await
            .unwrap();
        store
            .update(
                "asset-1",
                AssetUpdate::default()
                    .status(PipelineStatus::Generated)
                    .draft_result("t1", "https://x/a.glb"),
            )
            .await
            .unwrap();

        // Same values again: no conflict.
        store
            .update(
                "asset-1",
                AssetUpdate::default().draft_result("t1", "https://x/a.glb"),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn animation_results_accumulate_per_preset() {
        let store = store_with_asset().await;
        for status in [
            PipelineStatus::Generating,
            PipelineStatus::Generated,
            PipelineStatus::Rigging,
            PipelineStatus::Rigged,
            PipelineStatus::Animating,
        ] {
            store
                .update("asset-1", AssetUpdate::default().status(status))
                .await
                .unwrap();
        }

        store
            .update(
                "asset-1",
                AssetUpdate::default().animation_result("idle", "t3", "https://x/idle.glb"),
            )
            .await
            .unwrap();
        let record = store
            .update(
                "asset-1",
                AssetUpdate::default().animation_result("walk", "t4", "https://x/walk.glb"),
            )
            .await
            .unwrap();

        assert_eq!(record.animated_model_urls.len(), 2);
        assert_eq!(
            record.animated_model_urls.get("idle").map(String::as_str),
            Some("https://x/idle.glb")
        );
        assert_eq!(
            record.animation_task_ids.get("walk").map(String::as_str),
            Some("t4")
        );
    }

    #[tokio::test]
    async fn error_message_set_and_cleared() {
        let store = store_with_asset().await;
        store
            .update(
                "asset-1",
                AssetUpdate::default().status(PipelineStatus::Generating),
            )
            .await
            .unwrap();
        let record = store
            .update(
                "asset-1",
                AssetUpdate::default()
                    .status(PipelineStatus::Failed)
                    .error("boom"),
            )
            .await
            .unwrap();
        assert_eq!(record.error_message.as_deref(), Some("boom"));

        let record = store
            .update(
                "asset-1",
                AssetUpdate::default()
                    .status(PipelineStatus::Generating)
                    .clear_error(),
            )
            .await
            .unwrap();
        assert!(record.error_message.is_none());
    }
}
