//! Supervision of the `get_jobs` worker process.
//!
//! The [`Supervisor`] owns at most one worker launched from a Maven-built jar.
//! It builds, starts, stops, restarts and force-recovers the worker, captures
//! its output into a bounded [`LogBuffer`] and the session log file, and
//! verifies its health through process, port and HTTP observations.
//!
//! Host interactions sit behind the [`ProcessTable`], [`PortTable`],
//! [`HttpProbe`] and [`BuildTool`] capabilities so lifecycle behaviour can be
//! exercised without a real worker.

mod build;
mod environment;
mod error;
mod health;
mod lifecycle;
mod logs;
mod reclaim;
mod system;

#[cfg(test)]
mod tests;

pub use build::{BuildOutput, BuildTool, MavenBuild};
pub use environment::check_requirements;
pub use error::{BuildError, EnvironmentError, LaunchError, SupervisorError};
pub use health::{
    Health, HealthStatus, HealthTarget, HealthVerifier, Strictness, VerificationWarning,
};
pub use lifecycle::{
    Collaborators, FORCE_KILL_WAIT, LaunchMode, Operation, OperationReport, PROBE_TIMEOUT,
    RECLAIM_GRACE, RECLAIM_WAIT, RECOVER_SETTLE, RESTART_SETTLE, STOP_GRACE, STREAMER_JOIN,
    StatusReport, Step, StepOutcome, StepRecord, StopReport, Supervisor, SupervisorSettings,
    SupervisorState, Timings, WorkerHandle, resolve_artifact,
};
pub use logs::{
    LOG_BUFFER_CAPACITY, LOG_BUFFER_RETAIN, LogBuffer, LogLine, LogStreamer, count_marker,
    tail_log,
};
pub use reclaim::{PortReclaimer, ReclaimReport};
pub use system::{
    HttpProbe, PortTable, ProbeOutcome, ProcessTable, SystemError, SystemHttpProbe,
    SystemPortTable, SystemProcessTable, Termination,
};
