//! Pipeline event bus.
//!
//! This crate provides the in-process publish/subscribe hub the
//! orchestrator uses to surface pipeline lifecycle updates:
//!
//! - [`EventBus`] — fan-out hub backed by `tokio::sync::broadcast`.
//! - [`PipelineEvent`] — typed lifecycle events (stage started/progress/
//!   completed, pipeline completed/failed).

pub mod bus;

pub use bus::{EventBus, PipelineEvent};
