//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`PipelineEvent`]s.
//! It is designed to be shared via `Arc<EventBus>` across the pipeline
//! runner and any number of observers (status endpoints, loggers).

use serde::Serialize;
use tokio::sync::broadcast;

use assetforge_core::{AssetId, Stage};

// ---------------------------------------------------------------------------
// PipelineEvent
// ---------------------------------------------------------------------------

/// A pipeline lifecycle event for one asset.
///
/// `preset` is populated only for animation retargeting, which runs once
/// per requested preset.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A stage's remote job has been submitted.
    StageStarted {
        asset_id: AssetId,
        stage: Stage,
        #[serde(skip_serializing_if = "Option::is_none")]
        preset: Option<String>,
    },

    /// The provider reported progress for a running stage.
    StageProgress {
        asset_id: AssetId,
        stage: Stage,
        #[serde(skip_serializing_if = "Option::is_none")]
        preset: Option<String>,
        /// 0-100.
        percent: u8,
    },

    /// A stage reached `success` and its result was persisted.
    StageCompleted {
        asset_id: AssetId,
        stage: Stage,
        #[serde(skip_serializing_if = "Option::is_none")]
        preset: Option<String>,
        task_id: String,
        /// Absent for stages whose result is not an artifact (pre-check).
        #[serde(skip_serializing_if = "Option::is_none")]
        artifact_url: Option<String>,
        duration_ms: u64,
    },

    /// Every requested stage succeeded.
    PipelineCompleted { asset_id: AssetId },

    /// A stage failed and the asset was moved to `failed`.
    PipelineFailed {
        asset_id: AssetId,
        stage: Stage,
        #[serde(skip_serializing_if = "Option::is_none")]
        preset: Option<String>,
        error: String,
    },
}

impl PipelineEvent {
    /// The asset this event concerns.
    pub fn asset_id(&self) -> &str {
        match self {
            PipelineEvent::StageStarted { asset_id, .. }
            | PipelineEvent::StageProgress { asset_id, .. }
            | PipelineEvent::StageCompleted { asset_id, .. }
            | PipelineEvent::PipelineCompleted { asset_id }
            | PipelineEvent::PipelineFailed { asset_id, .. } => asset_id,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`PipelineEvent`].
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are
    /// dropped and slow receivers observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped;
    /// the persisted asset record remains the source of truth.
    pub fn publish(&self, event: PipelineEvent) {
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
