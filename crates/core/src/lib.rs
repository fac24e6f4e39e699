//! Core domain types for the assetforge generation pipeline.
//!
//! This crate holds everything the other workspace crates agree on:
//!
//! - [`AssetRecord`] — the persisted state of one asset's pipeline run.
//! - [`PipelineStatus`] — the asset-level state machine (distinct from
//!   any single remote job's status).
//! - [`Stage`] — identifiers for the individual pipeline stages.
//! - [`CoreError`] — the domain-level error type.
//!
//! It deliberately carries no I/O: provider integration lives in
//! `assetforge-tripo`, orchestration in `assetforge-pipeline`.

pub mod asset;
pub mod error;
pub mod stage;
pub mod types;

pub use asset::{AssetRecord, PipelineStatus};
pub use error::CoreError;
pub use stage::Stage;
pub use types::{new_asset_id, AssetId, Timestamp};
