//! Tripo-style 3D generation provider integration.
//!
//! Provides the typed wire boundary ([`task`]), the HTTP job client
//! ([`api`]), the backoff polling engine ([`poll`]), and the per-stage
//! submit/poll/extract wrappers ([`stage`]) used by the asset pipeline.

pub mod api;
pub mod poll;
pub mod stage;
pub mod task;

pub use api::{JobClient, JobRequest, TripoApi, TripoApiError};
pub use poll::{poll_task, PollError, PollOptions, ProgressFn};
pub use stage::{
    check_rig_eligibility, generate_mesh, retarget_animation, rig_mesh, MeshParams,
    PrerigCheckResult, StageError, StageResult,
};
pub use task::{JobType, RemoteJob, TaskOutput, TaskStatus};
