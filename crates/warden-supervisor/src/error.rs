//! Error taxonomy for supervisor operations.
//!
//! Environment and build failures abort composite operations. Verification
//! warnings never surface here; they are absorbed into
//! [`HealthStatus`](crate::HealthStatus). Incomplete teardown is reported via
//! [`StopReport`](crate::StopReport) and [`ReclaimReport`](crate::ReclaimReport)
//! rather than raised.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use warden_config::LayoutError;

use crate::system::SystemError;

/// Prerequisites missing from the host.
#[derive(Debug, Error)]
pub enum EnvironmentError {
    /// The deployment root does not exist.
    #[error("worker root '{path}' does not exist")]
    MissingWorkerRoot {
        /// Configured root directory.
        path: PathBuf,
    },
    /// The worker source directory does not exist.
    #[error("worker directory '{path}' does not exist")]
    MissingWorkerDir {
        /// Resolved worker directory.
        path: PathBuf,
    },
    /// The log directory could not be created.
    #[error(transparent)]
    LogDirectory(#[from] LayoutError),
    /// The build tool did not answer a version query.
    #[error("build tool '{program}' is unavailable: {source}")]
    BuildToolUnavailable {
        /// Build program that was queried.
        program: String,
        /// Failure reported by the build capability.
        #[source]
        source: BuildError,
    },
}

/// Failures reported by the build capability.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The build program could not be executed.
    #[error("failed to run '{program}': {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Waiting on the build process failed.
    #[error("failed to monitor build process: {source}")]
    Wait {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The build exited unsuccessfully.
    #[error("build failed ({}): {diagnostic}", describe_exit(*status))]
    Failed {
        /// Exit code, when the build was not killed by a signal.
        status: Option<i32>,
        /// Diagnostic output captured from the build.
        diagnostic: String,
    },
    /// The build exceeded its time budget and was killed.
    #[error("build timed out after {}s", timeout.as_secs())]
    TimedOut {
        /// Budget that elapsed.
        timeout: Duration,
    },
}

fn describe_exit(status: Option<i32>) -> String {
    status.map_or_else(
        || String::from("terminated by signal"),
        |code| format!("exit code {code}"),
    )
}

/// Failures raised while launching the worker.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// A worker is already active, either attached or found on the host.
    #[error("worker already running with pid {pid}")]
    AlreadyRunning {
        /// PID of the running worker.
        pid: u32,
    },
    /// Neither the primary nor the fallback artefact exists.
    #[error("no build artefact found at '{primary}' or '{fallback}'")]
    ArtifactMissing {
        /// Primary artefact path.
        primary: PathBuf,
        /// Fallback artefact path.
        fallback: PathBuf,
    },
    /// The log directory could not be created.
    #[error(transparent)]
    LogDirectory(#[from] LayoutError),
    /// The session log file could not be prepared.
    #[error("failed to prepare session log '{path}': {source}")]
    LogFile {
        /// Session log path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Creating the output pipe failed.
    #[error("failed to create worker output pipe: {source}")]
    Pipe {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The worker process could not be spawned.
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The log streaming thread could not be started.
    #[error("failed to start log streamer: {source}")]
    Streamer {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The worker exited before the startup settle period elapsed.
    #[error("worker (pid {pid}) exited during startup")]
    ExitedDuringStartup {
        /// PID of the worker that exited.
        pid: u32,
    },
    /// The process table could not be consulted for competing workers.
    #[error("failed to inspect running processes: {source}")]
    ProcessTable {
        /// Underlying system error.
        #[source]
        source: SystemError,
    },
}

/// Umbrella error returned by [`Supervisor`](crate::Supervisor) operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Host prerequisites are missing.
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
    /// The build failed.
    #[error(transparent)]
    Build(#[from] BuildError),
    /// The worker could not be launched.
    #[error(transparent)]
    Launch(#[from] LaunchError),
    /// Forced recovery could not free the worker port.
    #[error("port {port} is still bound after reclamation")]
    PortStillBound {
        /// Worker port.
        port: u16,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_build_mentions_exit_code_and_diagnostic() {
        let error = BuildError::Failed {
            status: Some(1),
            diagnostic: String::from("[ERROR] compilation failure"),
        };
        assert_eq!(
            error.to_string(),
            "build failed (exit code 1): [ERROR] compilation failure"
        );
    }

    #[test]
    fn signalled_build_is_described() {
        let error = BuildError::Failed {
            status: None,
            diagnostic: String::new(),
        };
        assert!(error.to_string().contains("terminated by signal"));
    }

    #[test]
    fn supervisor_error_is_transparent_over_launch_errors() {
        let error = SupervisorError::from(LaunchError::AlreadyRunning { pid: 42 });
        assert_eq!(error.to_string(), "worker already running with pid 42");
    }
}
