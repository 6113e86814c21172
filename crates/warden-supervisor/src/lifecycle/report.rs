use std::fmt;
use std::path::PathBuf;

use super::state::SupervisorState;
use crate::error::SupervisorError;
use crate::health::HealthStatus;

/// A step of a composite operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Graceful stop of worker processes.
    Stop,
    /// Forced kill of recovery targets.
    Kill,
    /// Port reclamation.
    Reclaim,
    /// Artefact build.
    Build,
    /// Worker launch.
    Start,
    /// Health verification.
    Verify,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Stop => "stop",
            Self::Kill => "kill",
            Self::Reclaim => "reclaim",
            Self::Build => "build",
            Self::Start => "start",
            Self::Verify => "verify",
        };
        f.write_str(label)
    }
}

/// Outcome of a single step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step completed.
    Succeeded(String),
    /// The step completed partially; the sequence continued.
    Partial(String),
    /// The step failed.
    Failed(String),
}

impl StepOutcome {
    /// Detail text attached to the outcome.
    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            Self::Succeeded(detail) | Self::Partial(detail) | Self::Failed(detail) => detail,
        }
    }
}

/// A step and its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    /// Which step ran.
    pub step: Step,
    /// How it ended.
    pub outcome: StepOutcome,
}

/// Composite operations that produce a step report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Stop, build, start, verify.
    Restart,
    /// Kill, reclaim, clean build, start, verify.
    ForceRecover,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Restart => f.write_str("restart"),
            Self::ForceRecover => f.write_str("force-recover"),
        }
    }
}

/// Step-by-step account of a composite operation.
#[derive(Debug)]
pub struct OperationReport {
    operation: Operation,
    steps: Vec<StepRecord>,
    health: Option<HealthStatus>,
    failure: Option<SupervisorError>,
}

impl OperationReport {
    pub(crate) const fn new(operation: Operation) -> Self {
        Self {
            operation,
            steps: Vec::new(),
            health: None,
            failure: None,
        }
    }

    pub(crate) fn record(&mut self, step: Step, outcome: StepOutcome) {
        self.steps.push(StepRecord { step, outcome });
    }

    pub(crate) fn fail(mut self, step: Step, error: SupervisorError) -> Self {
        self.record(step, StepOutcome::Failed(error.to_string()));
        self.failure = Some(error);
        self
    }

    pub(crate) fn verified(&mut self, health: HealthStatus) {
        let outcome = if health.is_healthy() {
            StepOutcome::Succeeded(health.diagnostic().to_owned())
        } else {
            StepOutcome::Failed(health.diagnostic().to_owned())
        };
        self.record(Step::Verify, outcome);
        self.health = Some(health);
    }

    /// Which operation ran.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    /// Attempted steps in order.
    #[must_use]
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Final verification result, when the sequence got that far.
    #[must_use]
    pub const fn health(&self) -> Option<&HealthStatus> {
        self.health.as_ref()
    }

    /// Error that aborted the sequence.
    #[must_use]
    pub const fn failure(&self) -> Option<&SupervisorError> {
        self.failure.as_ref()
    }

    /// First step that failed.
    #[must_use]
    pub fn failed_step(&self) -> Option<Step> {
        self.steps
            .iter()
            .find(|record| matches!(record.outcome, StepOutcome::Failed(_)))
            .map(|record| record.step)
    }

    /// The sequence ran to completion and the worker verified healthy.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failure.is_none() && self.health.as_ref().is_some_and(HealthStatus::is_healthy)
    }
}

/// Result of a graceful stop. Incomplete teardown is reported, not raised.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StopReport {
    signalled: Vec<u32>,
    survivors: Vec<u32>,
}

impl StopReport {
    pub(crate) const fn new(signalled: Vec<u32>, survivors: Vec<u32>) -> Self {
        Self {
            signalled,
            survivors,
        }
    }

    /// Processes sent `SIGTERM`.
    #[must_use]
    pub fn signalled(&self) -> &[u32] {
        &self.signalled
    }

    /// Processes still matching the worker tags after the grace period.
    #[must_use]
    pub fn survivors(&self) -> &[u32] {
        &self.survivors
    }

    /// Reports whether no worker process remains.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.survivors.is_empty()
    }
}

impl fmt::Display for StopReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.signalled.is_empty() && self.survivors.is_empty() {
            return f.write_str("no worker processes running");
        }
        if self.is_complete() {
            return write!(f, "stopped {} process(es)", self.signalled.len());
        }
        write!(f, "teardown incomplete; still running: {:?}", self.survivors)
    }
}

/// Snapshot returned by [`Supervisor::status`](crate::Supervisor::status).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// Health verdict with completed-unit count.
    pub health: HealthStatus,
    /// Supervisor state when the snapshot was taken.
    pub state: SupervisorState,
    /// PID of the attached worker, if any.
    pub worker_pid: Option<u32>,
    /// Session log consulted for the tail.
    pub log_path: PathBuf,
    /// Most recent log lines, oldest first.
    pub recent_logs: Vec<String>,
}
