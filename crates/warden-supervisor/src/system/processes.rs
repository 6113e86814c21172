use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid as NixPid;
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, UpdateKind};
use tracing::debug;

use super::{ProcessTable, SYSTEM_TARGET, SystemError, Termination};

/// [`ProcessTable`] backed by `sysinfo` and `kill(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessTable;

impl SystemProcessTable {
    /// Builds the adapter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ProcessTable for SystemProcessTable {
    fn find(&self, tag: &str) -> Result<Vec<u32>, SystemError> {
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always),
        );
        if system.processes().is_empty() {
            return Err(SystemError::ProcessTable {
                message: String::from("no processes visible"),
            });
        }

        let own_pid = std::process::id();
        let mut matches: Vec<u32> = system
            .processes()
            .iter()
            .filter(|(_, process)| process.thread_kind().is_none())
            .filter(|(_, process)| process.status() != ProcessStatus::Zombie)
            .filter(|(pid, _)| pid.as_u32() != own_pid)
            .filter(|(_, process)| command_line(process.cmd()).contains(tag))
            .map(|(pid, _)| pid.as_u32())
            .collect();
        matches.sort_unstable();
        debug!(target: SYSTEM_TARGET, tag, ?matches, "process table scanned");
        Ok(matches)
    }

    fn signal(&self, pid: u32, termination: Termination) -> Result<(), SystemError> {
        let signal = match termination {
            Termination::Graceful => Signal::SIGTERM,
            Termination::Forced => Signal::SIGKILL,
        };
        let Ok(raw) = i32::try_from(pid) else {
            return Err(SystemError::Signal {
                pid,
                source: Errno::EINVAL,
            });
        };
        match kill(NixPid::from_raw(raw), signal) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(source) => Err(SystemError::Signal { pid, source }),
        }
    }

    fn is_alive(&self, pid: u32) -> bool {
        let target = Pid::from_u32(pid);
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[target]),
            true,
            ProcessRefreshKind::nothing(),
        );
        system
            .process(target)
            .is_some_and(|process| process.status() != ProcessStatus::Zombie)
    }
}

fn command_line(parts: &[std::ffi::OsString]) -> String {
    parts
        .iter()
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}
