//! Forced reclamation of the worker port.
//!
//! Only the coarse recovery path uses this. It terminates whatever holds the
//! port, escalating from `SIGTERM` to `SIGKILL`, and reports what happened
//! rather than failing.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::system::{PortTable, ProcessTable, Termination};

const RECLAIM_TARGET: &str = "warden::reclaim";
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Outcome of a reclamation pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReclaimReport {
    port: u16,
    killed: Vec<u32>,
    survivors: Vec<u32>,
    released: bool,
    lookup_failed: bool,
}

impl ReclaimReport {
    /// Port that was reclaimed.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Processes that were terminated.
    #[must_use]
    pub fn killed(&self) -> &[u32] {
        &self.killed
    }

    /// Processes still alive after `SIGKILL`.
    #[must_use]
    pub fn survivors(&self) -> &[u32] {
        &self.survivors
    }

    /// Reports whether the port stopped accepting connections in time.
    #[must_use]
    pub const fn released(&self) -> bool {
        self.released
    }

    /// Reports whether the port owners could not be listed, so holders may
    /// have been missed.
    #[must_use]
    pub const fn lookup_failed(&self) -> bool {
        self.lookup_failed
    }

    /// Reports whether every holder was found and terminated and the port
    /// released.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.lookup_failed && self.survivors.is_empty() && self.released
    }
}

/// Terminates the processes holding a port.
#[derive(Clone)]
pub struct PortReclaimer {
    processes: Arc<dyn ProcessTable>,
    ports: Arc<dyn PortTable>,
    grace: Duration,
    release_wait: Duration,
}

impl std::fmt::Debug for PortReclaimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortReclaimer")
            .field("grace", &self.grace)
            .field("release_wait", &self.release_wait)
            .finish_non_exhaustive()
    }
}

impl PortReclaimer {
    /// Builds a reclaimer.
    ///
    /// `grace` separates `SIGTERM` from `SIGKILL`; `release_wait` bounds the
    /// wait for the port to close afterwards.
    #[must_use]
    pub fn new(
        processes: Arc<dyn ProcessTable>,
        ports: Arc<dyn PortTable>,
        grace: Duration,
        release_wait: Duration,
    ) -> Self {
        Self {
            processes,
            ports,
            grace,
            release_wait,
        }
    }

    /// Terminates every process holding `port` and waits for it to close.
    #[must_use]
    pub fn reclaim(&self, port: u16) -> ReclaimReport {
        let own_pid = std::process::id();
        let (holders, lookup_failed): (Vec<u32>, bool) = match self.ports.owners(port) {
            Ok(pids) => (pids.into_iter().filter(|pid| *pid != own_pid).collect(), false),
            Err(error) => {
                warn!(
                    target: RECLAIM_TARGET,
                    port,
                    error = %error,
                    "port owner lookup failed"
                );
                (Vec::new(), true)
            }
        };

        if !holders.is_empty() {
            info!(target: RECLAIM_TARGET, port, ?holders, "terminating port holders");
            self.signal_all(&holders, Termination::Graceful);
            thread::sleep(self.grace);
            let stubborn: Vec<u32> = holders
                .iter()
                .copied()
                .filter(|pid| self.processes.is_alive(*pid))
                .collect();
            self.signal_all(&stubborn, Termination::Forced);
        }

        let survivors: Vec<u32> = holders
            .iter()
            .copied()
            .filter(|pid| self.processes.is_alive(*pid))
            .collect();
        let killed = holders
            .iter()
            .copied()
            .filter(|pid| !survivors.contains(pid))
            .collect();
        let released = self.wait_for_release(port);

        let report = ReclaimReport {
            port,
            killed,
            survivors,
            released,
            lookup_failed,
        };
        if report.is_complete() {
            info!(
                target: RECLAIM_TARGET,
                port,
                killed = report.killed.len(),
                "port reclaimed"
            );
        } else {
            warn!(
                target: RECLAIM_TARGET,
                port,
                survivors = ?report.survivors,
                released = report.released,
                lookup_failed = report.lookup_failed,
                "port reclamation incomplete"
            );
        }
        report
    }

    fn signal_all(&self, pids: &[u32], termination: Termination) {
        for pid in pids {
            if let Err(error) = self.processes.signal(*pid, termination) {
                warn!(
                    target: RECLAIM_TARGET,
                    pid,
                    ?termination,
                    error = %error,
                    "signal failed"
                );
            }
        }
    }

    fn wait_for_release(&self, port: u16) -> bool {
        let deadline = Instant::now() + self.release_wait;
        loop {
            if !self.ports.is_listening(port) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;
    use crate::system::SystemError;

    /// Processes that die on the listed signals, recording every delivery.
    #[derive(Default)]
    struct ScriptedProcesses {
        alive: Mutex<HashSet<u32>>,
        ignores_sigterm: HashSet<u32>,
        unkillable: HashSet<u32>,
        deliveries: Mutex<Vec<(u32, Termination)>>,
    }

    impl ProcessTable for ScriptedProcesses {
        fn find(&self, _tag: &str) -> Result<Vec<u32>, SystemError> {
            Ok(Vec::new())
        }

        fn signal(&self, pid: u32, termination: Termination) -> Result<(), SystemError> {
            self.deliveries
                .lock()
                .expect("deliveries lock")
                .push((pid, termination));
            let dies = match termination {
                Termination::Graceful => !self.ignores_sigterm.contains(&pid),
                Termination::Forced => !self.unkillable.contains(&pid),
            };
            if dies {
                self.alive.lock().expect("alive lock").remove(&pid);
            }
            Ok(())
        }

        fn is_alive(&self, pid: u32) -> bool {
            self.alive.lock().expect("alive lock").contains(&pid)
        }
    }

    /// Port held while any of its owners is alive.
    struct HeldPort {
        processes: Arc<ScriptedProcesses>,
        owners: Vec<u32>,
    }

    impl PortTable for HeldPort {
        fn is_listening(&self, _port: u16) -> bool {
            self.owners.iter().any(|pid| self.processes.is_alive(*pid))
        }

        fn owners(&self, _port: u16) -> Result<Vec<u32>, SystemError> {
            Ok(self.owners.clone())
        }
    }

    fn reclaimer(
        alive: &[u32],
        ignores_sigterm: &[u32],
        unkillable: &[u32],
    ) -> (PortReclaimer, Arc<ScriptedProcesses>) {
        let processes = Arc::new(ScriptedProcesses {
            alive: Mutex::new(alive.iter().copied().collect()),
            ignores_sigterm: ignores_sigterm.iter().copied().collect(),
            unkillable: unkillable.iter().copied().collect(),
            deliveries: Mutex::default(),
        });
        let ports = Arc::new(HeldPort {
            processes: Arc::clone(&processes),
            owners: alive.to_vec(),
        });
        let reclaimer = PortReclaimer::new(
            Arc::clone(&processes) as Arc<dyn ProcessTable>,
            ports,
            Duration::ZERO,
            Duration::from_millis(200),
        );
        (reclaimer, processes)
    }

    #[test]
    fn cooperative_holders_get_only_sigterm() {
        let (reclaimer, processes) = reclaimer(&[10, 11], &[], &[]);
        let report = reclaimer.reclaim(8080);
        assert!(report.is_complete());
        assert_eq!(report.killed(), &[10, 11]);
        let deliveries = processes.deliveries.lock().expect("deliveries lock");
        assert!(
            deliveries
                .iter()
                .all(|(_, termination)| *termination == Termination::Graceful)
        );
    }

    #[test]
    fn stubborn_holders_are_escalated_to_sigkill() {
        let (reclaimer, processes) = reclaimer(&[10, 11], &[11], &[]);
        let report = reclaimer.reclaim(8080);
        assert!(report.is_complete());
        assert_eq!(report.killed(), &[10, 11]);
        let deliveries = processes.deliveries.lock().expect("deliveries lock");
        assert!(deliveries.contains(&(11, Termination::Forced)));
        assert!(!deliveries.contains(&(10, Termination::Forced)));
    }

    #[test]
    fn survivors_are_reported_not_raised() {
        let (reclaimer, _) = reclaimer(&[10, 11], &[11], &[11]);
        let report = reclaimer.reclaim(8080);
        assert_eq!(report.killed(), &[10]);
        assert_eq!(report.survivors(), &[11]);
        assert!(!report.released());
        assert!(!report.is_complete());
    }

    #[test]
    fn free_port_needs_no_signals() {
        let (reclaimer, processes) = reclaimer(&[], &[], &[]);
        let report = reclaimer.reclaim(8080);
        assert!(report.is_complete());
        assert!(report.killed().is_empty());
        assert!(processes.deliveries.lock().expect("deliveries lock").is_empty());
    }

    struct UnlistablePort;

    impl PortTable for UnlistablePort {
        fn is_listening(&self, _port: u16) -> bool {
            false
        }

        fn owners(&self, _port: u16) -> Result<Vec<u32>, SystemError> {
            Err(SystemError::Command {
                program: String::from("lsof"),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        }
    }

    #[test]
    fn failed_owner_lookup_leaves_the_report_incomplete() {
        let reclaimer = PortReclaimer::new(
            Arc::new(ScriptedProcesses::default()),
            Arc::new(UnlistablePort),
            Duration::ZERO,
            Duration::from_millis(100),
        );
        let report = reclaimer.reclaim(8080);
        assert!(report.released());
        assert!(report.lookup_failed());
        assert!(!report.is_complete());
    }
}
