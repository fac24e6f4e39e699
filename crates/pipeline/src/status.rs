//! Read-only status projection of an asset record.

use std::collections::BTreeMap;

use serde::Serialize;

use assetforge_core::{AssetRecord, PipelineStatus};

/// The caller-facing view of one asset's pipeline run.
///
/// A projection of [`AssetRecord`] that keeps whatever stage results
/// exist: a failed run still exposes the artifacts of the stages that
/// completed before the failure.
#[derive(Debug, Clone, Serialize)]
pub struct AssetStatusView {
    pub asset_id: String,
    pub pipeline_status: PipelineStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_model_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rigged_model_url: Option<String>,
    /// Retargeted animation artifacts, keyed by preset.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub animated_model_urls: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AssetStatusView {
    pub fn from_record(record: &AssetRecord) -> Self {
        Self {
            asset_id: record.asset_id.clone(),
            pipeline_status: record.pipeline_status,
            draft_model_url: record.draft_model_url.clone(),
            rigged_model_url: record.rigged_model_url.clone(),
            animated_model_urls: record.animated_model_urls.clone(),
            error_message: record.error_message.clone(),
        }
    }
}
