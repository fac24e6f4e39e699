//! Task-chain orchestration for the asset generation pipeline.
//!
//! - [`store`] — the persistence seam ([`AssetStore`]) with an
//!   in-memory implementation and invariant-enforcing partial updates.
//! - [`status`] — the read-only projection served to status endpoints.
//! - [`runner`] — [`PipelineRunner`], the state machine that drives one
//!   asset through mesh generation, optional rigging, and animation
//!   retargeting, persisting after every stage.

pub mod runner;
pub mod status;
pub mod store;

pub use runner::{PipelineError, PipelineRequest, PipelineRunner};
pub use status::AssetStatusView;
pub use store::{AssetStore, AssetUpdate, MemoryStore};
