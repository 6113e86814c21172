//! Error types for the CLI runtime.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use warden_supervisor::{Health, Operation, Step, SupervisorError};

use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
    #[error("{operation} failed at step '{step}'")]
    OperationFailed { operation: Operation, step: Step },
    #[error("worker is {health}: {diagnostic}")]
    Unhealthy { health: Health, diagnostic: String },
    #[error("teardown incomplete; still running: {survivors:?}")]
    TeardownIncomplete { survivors: Vec<u32> },
    #[error("no session log at {}", path.display())]
    MissingLog { path: PathBuf },
    #[error("failed to read session log {}: {source}", path.display())]
    ReadLog { path: PathBuf, source: io::Error },
    #[error("failed to install signal handlers: {0}")]
    Signals(io::Error),
    #[error("worker (pid {pid}) exited")]
    WorkerExited { pid: u32 },
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}
