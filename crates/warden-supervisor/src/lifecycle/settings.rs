use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use warden_config::{Config, WorkerLayout};

use super::launch::LaunchMode;
use crate::build::{BuildTool, MavenBuild};
use crate::system::{
    HttpProbe, PortTable, ProcessTable, SystemHttpProbe, SystemPortTable, SystemProcessTable,
};

/// Grace period between `SIGTERM` and the stop re-check.
pub const STOP_GRACE: Duration = Duration::from_secs(3);
/// Settle period between a restart's launch and its health check.
pub const RESTART_SETTLE: Duration = Duration::from_secs(2);
/// Settle period between a forced recovery's launch and its health check.
pub const RECOVER_SETTLE: Duration = Duration::from_secs(5);
/// Wait after force-killing recovery targets.
pub const FORCE_KILL_WAIT: Duration = Duration::from_secs(2);
/// Grace period between `SIGTERM` and `SIGKILL` while reclaiming the port.
pub const RECLAIM_GRACE: Duration = Duration::from_secs(1);
/// Upper bound on waiting for a reclaimed port to close.
pub const RECLAIM_WAIT: Duration = Duration::from_secs(2);
/// Timeout for the application probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound on joining the log streamer of an exited worker.
pub const STREAMER_JOIN: Duration = Duration::from_secs(2);

/// Fixed waits and timeouts used by lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Wait after launch before the worker counts as started.
    pub startup_settle: Duration,
    /// See [`STOP_GRACE`].
    pub stop_grace: Duration,
    /// See [`RESTART_SETTLE`].
    pub restart_settle: Duration,
    /// See [`RECOVER_SETTLE`].
    pub recover_settle: Duration,
    /// See [`FORCE_KILL_WAIT`].
    pub force_kill_wait: Duration,
    /// See [`RECLAIM_GRACE`].
    pub reclaim_grace: Duration,
    /// See [`RECLAIM_WAIT`].
    pub reclaim_wait: Duration,
    /// Upper bound on a build.
    pub build_timeout: Duration,
    /// See [`PROBE_TIMEOUT`].
    pub probe_timeout: Duration,
    /// See [`STREAMER_JOIN`].
    pub streamer_join: Duration,
}

impl Timings {
    /// Timings with the configured settle period and build budget.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self {
            startup_settle: config.startup_settle(),
            stop_grace: STOP_GRACE,
            restart_settle: RESTART_SETTLE,
            recover_settle: RECOVER_SETTLE,
            force_kill_wait: FORCE_KILL_WAIT,
            reclaim_grace: RECLAIM_GRACE,
            reclaim_wait: RECLAIM_WAIT,
            build_timeout: config.build_timeout(),
            probe_timeout: PROBE_TIMEOUT,
            streamer_join: STREAMER_JOIN,
        }
    }
}

/// Everything the supervisor derives from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorSettings {
    /// Worker filesystem layout.
    pub layout: WorkerLayout,
    /// Worker port.
    pub port: u16,
    /// Application status URL.
    pub probe_url: String,
    /// Primary worker tag, used for presence checks.
    pub process_tag: String,
    /// Secondary tag also stopped by [`stop`](crate::Supervisor::stop).
    pub entry_tag: String,
    /// Broad tag force-killed by recovery.
    pub recovery_tag: String,
    /// Program that runs the artefact.
    pub launch_program: String,
    /// Log fragment marking one completed unit of work.
    pub completion_marker: String,
    /// Whether launched workers stream through the supervisor.
    pub launch_mode: LaunchMode,
    /// Waits and timeouts.
    pub timings: Timings,
}

impl SupervisorSettings {
    /// Derives settings from configuration, streaming worker output.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            layout: config.layout(),
            port: config.backend_port,
            probe_url: config.probe_url(),
            process_tag: config.process_tag.clone(),
            entry_tag: config.entry_tag.clone(),
            recovery_tag: config.recovery_tag.clone(),
            launch_program: config.launch_program.clone(),
            completion_marker: config.completion_marker.clone(),
            launch_mode: LaunchMode::Stream,
            timings: Timings::from_config(config),
        }
    }

    /// Replaces the launch mode.
    #[must_use]
    pub const fn with_launch_mode(mut self, mode: LaunchMode) -> Self {
        self.launch_mode = mode;
        self
    }
}

/// Host capabilities the supervisor drives.
#[derive(Clone)]
pub struct Collaborators {
    /// Process table and signal delivery.
    pub processes: Arc<dyn ProcessTable>,
    /// Port observations.
    pub ports: Arc<dyn PortTable>,
    /// Application probe.
    pub probe: Arc<dyn HttpProbe>,
    /// Build capability.
    pub build: Arc<dyn BuildTool>,
}

impl Collaborators {
    /// Real system adapters with the configured build program.
    #[must_use]
    pub fn system(config: &Config) -> Self {
        Self {
            processes: Arc::new(SystemProcessTable::new()),
            ports: Arc::new(SystemPortTable::new()),
            probe: Arc::new(SystemHttpProbe::new()),
            build: Arc::new(MavenBuild::new(config.build_program.clone())),
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("build", &self.build.program())
            .finish_non_exhaustive()
    }
}
