//! Worker lifecycle: launching, stopping, rebuilding and recovering the single
//! supervised worker.

mod controller;
mod handle;
mod launch;
mod report;
mod settings;
mod state;

pub use controller::Supervisor;
pub use handle::WorkerHandle;
pub use launch::{LaunchMode, resolve_artifact};
pub use report::{
    Operation, OperationReport, StatusReport, Step, StepOutcome, StepRecord, StopReport,
};
pub use settings::{
    Collaborators, FORCE_KILL_WAIT, PROBE_TIMEOUT, RECLAIM_GRACE, RECLAIM_WAIT, RECOVER_SETTLE,
    RESTART_SETTLE, STOP_GRACE, STREAMER_JOIN, SupervisorSettings, Timings,
};
pub use state::SupervisorState;

pub(crate) const LIFECYCLE_TARGET: &str = "warden::lifecycle";
