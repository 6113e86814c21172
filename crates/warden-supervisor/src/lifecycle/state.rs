use std::fmt;

/// Lifecycle state of the supervisor. Idle is both initial and terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SupervisorState {
    /// No worker is attached.
    #[default]
    Idle,
    /// The build collaborator is running.
    Building,
    /// The worker is being launched.
    Starting,
    /// Worker health is being verified.
    Verifying,
    /// A worker is attached and running.
    Running,
    /// Worker processes are being stopped.
    Stopping,
    /// Forced recovery is in progress.
    Recovering,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Building => "building",
            Self::Starting => "starting",
            Self::Verifying => "verifying",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Recovering => "recovering",
        };
        f.write_str(label)
    }
}
