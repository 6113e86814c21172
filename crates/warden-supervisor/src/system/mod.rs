//! Capabilities the supervisor needs from the host.
//!
//! Each capability is a trait so lifecycle logic can run against fakes in
//! tests. The `System*` adapters talk to the real operating system.

use std::io;
use std::time::Duration;

use thiserror::Error;

mod ports;
mod probe;
mod processes;

pub use ports::SystemPortTable;
pub use probe::SystemHttpProbe;
pub use processes::SystemProcessTable;

pub(crate) const SYSTEM_TARGET: &str = "warden::system";

/// Signal used to terminate a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// `SIGTERM`: ask the process to exit.
    Graceful,
    /// `SIGKILL`: end the process unconditionally.
    Forced,
}

/// Errors raised by the system adapters.
#[derive(Debug, Error)]
pub enum SystemError {
    /// The process table could not be read.
    #[error("process table unavailable: {message}")]
    ProcessTable {
        /// Description of the failure.
        message: String,
    },
    /// Delivering a signal failed for a reason other than the process having
    /// exited already.
    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        /// Target process.
        pid: u32,
        /// Underlying errno.
        #[source]
        source: nix::errno::Errno,
    },
    /// An external helper command could not be run.
    #[error("failed to run '{program}': {source}")]
    Command {
        /// Helper program.
        program: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Read access to the host process table plus signal delivery.
pub trait ProcessTable: Send + Sync {
    /// Returns the PIDs whose command line contains `tag`, excluding the
    /// calling process.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError::ProcessTable`] when the table cannot be read.
    fn find(&self, tag: &str) -> Result<Vec<u32>, SystemError>;

    /// Sends a termination signal. A process that has already exited is not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError::Signal`] when delivery fails, e.g. for lack of
    /// permission.
    fn signal(&self, pid: u32, termination: Termination) -> Result<(), SystemError>;

    /// Reports whether `pid` names a live, non-zombie process.
    fn is_alive(&self, pid: u32) -> bool;
}

/// Port-level observations.
pub trait PortTable: Send + Sync {
    /// Reports whether something accepts connections on the local port.
    fn is_listening(&self, port: u16) -> bool;

    /// Lists the PIDs holding the port.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError::Command`] when the lookup helper cannot run.
    fn owners(&self, port: u16) -> Result<Vec<u32>, SystemError>;
}

/// Outcome of an application-level probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The endpoint answered with this HTTP status.
    Status(u16),
    /// The endpoint could not be reached within the timeout.
    Unreachable(String),
    /// No probing capability is compiled in.
    Unavailable,
}

/// Application-level HTTP probe.
pub trait HttpProbe: Send + Sync {
    /// Issues a GET against `url`.
    fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome;
}
