use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use tracing::{debug, info, warn};
use warden_config::Config;

use super::LIFECYCLE_TARGET;
use super::handle::WorkerHandle;
use super::launch::{LaunchMode, LaunchRequest, launch, resolve_artifact};
use super::report::{Operation, OperationReport, StatusReport, Step, StepOutcome, StopReport};
use super::settings::{Collaborators, SupervisorSettings};
use super::state::SupervisorState;
use crate::build::BuildOutput;
use crate::environment::check_requirements;
use crate::error::{LaunchError, SupervisorError};
use crate::health::{HealthStatus, HealthTarget, HealthVerifier, Strictness};
use crate::logs::{LogBuffer, count_marker, tail_log};
use crate::reclaim::PortReclaimer;
use crate::system::Termination;

/// Owns the single worker and serialises every lifecycle operation through
/// `&mut self`.
#[derive(Debug)]
pub struct Supervisor {
    settings: SupervisorSettings,
    collaborators: Collaborators,
    verifier: HealthVerifier,
    reclaimer: PortReclaimer,
    buffer: Arc<LogBuffer>,
    worker: Option<WorkerHandle>,
    state: SupervisorState,
}

impl Supervisor {
    /// Builds an idle supervisor over the given capabilities.
    #[must_use]
    pub fn new(settings: SupervisorSettings, collaborators: Collaborators) -> Self {
        let verifier = HealthVerifier::new(
            Arc::clone(&collaborators.processes),
            Arc::clone(&collaborators.ports),
            Arc::clone(&collaborators.probe),
        );
        let reclaimer = PortReclaimer::new(
            Arc::clone(&collaborators.processes),
            Arc::clone(&collaborators.ports),
            settings.timings.reclaim_grace,
            settings.timings.reclaim_wait,
        );
        let buffer = Arc::new(LogBuffer::new(settings.completion_marker.clone()));
        Self {
            settings,
            collaborators,
            verifier,
            reclaimer,
            buffer,
            worker: None,
            state: SupervisorState::Idle,
        }
    }

    /// Builds a supervisor backed by the host system.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            SupervisorSettings::from_config(config),
            Collaborators::system(config),
        )
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SupervisorState {
        self.state
    }

    /// Settings in effect.
    #[must_use]
    pub const fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    /// The attached worker, if any.
    #[must_use]
    pub const fn worker(&self) -> Option<&WorkerHandle> {
        self.worker.as_ref()
    }

    /// Shared session log buffer.
    #[must_use]
    pub fn log_buffer(&self) -> Arc<LogBuffer> {
        Arc::clone(&self.buffer)
    }

    /// Reports whether an attached worker is still running.
    #[must_use]
    pub fn is_worker_running(&self) -> bool {
        self.worker.as_ref().is_some_and(WorkerHandle::is_running)
    }

    /// Checks host prerequisites, including the build tool when `with_build`.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Environment`] for the first missing
    /// prerequisite.
    pub fn check_environment(&self, with_build: bool) -> Result<(), SupervisorError> {
        let tool = with_build.then_some(self.collaborators.build.as_ref());
        check_requirements(&self.settings.layout, tool)?;
        Ok(())
    }

    /// Builds the worker artefact.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Build`] when the build fails or times out.
    pub fn build(&mut self, clean: bool) -> Result<BuildOutput, SupervisorError> {
        self.transition(SupervisorState::Building);
        let result = self.collaborators.build.build(
            self.settings.layout.worker_dir(),
            clean,
            self.settings.timings.build_timeout,
        );
        self.rest();
        let output = result?;
        info!(
            target: LIFECYCLE_TARGET,
            clean,
            elapsed_ms = output.elapsed.as_millis(),
            "build finished"
        );
        Ok(output)
    }

    /// Launches the worker and waits for the startup settle period.
    ///
    /// Returns the worker PID.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::AlreadyRunning`] when a worker is attached or a
    /// tagged process already runs on the host,
    /// [`LaunchError::ArtifactMissing`] before spawning when no artefact
    /// exists, and [`LaunchError::ExitedDuringStartup`] when the worker dies
    /// during the settle period.
    pub fn start(&mut self) -> Result<u32, SupervisorError> {
        self.reap_exited();
        if let Some(worker) = &self.worker {
            return Err(LaunchError::AlreadyRunning { pid: worker.pid() }.into());
        }
        let existing = self
            .collaborators
            .processes
            .find(&self.settings.process_tag)
            .map_err(|source| LaunchError::ProcessTable { source })?;
        if let Some(pid) = existing.first() {
            return Err(LaunchError::AlreadyRunning { pid: *pid }.into());
        }
        let artifact = resolve_artifact(&self.settings.layout)?;

        self.transition(SupervisorState::Starting);
        let request = LaunchRequest {
            program: &self.settings.launch_program,
            artifact: &artifact,
            layout: &self.settings.layout,
            mode: self.settings.launch_mode,
        };
        let worker = match launch(&request, &self.buffer) {
            Ok(worker) => worker,
            Err(error) => {
                self.rest();
                return Err(error.into());
            }
        };
        let pid = worker.pid();

        thread::sleep(self.settings.timings.startup_settle);
        if !worker.is_running() {
            self.discard(worker);
            self.rest();
            warn!(target: LIFECYCLE_TARGET, pid, "worker exited during startup");
            return Err(LaunchError::ExitedDuringStartup { pid }.into());
        }
        self.worker = Some(worker);
        self.transition(SupervisorState::Running);
        Ok(pid)
    }

    /// Sends `SIGTERM` to every tagged process and the attached worker, then
    /// re-checks after the grace period. Never escalates.
    pub fn stop(&mut self) -> StopReport {
        self.transition(SupervisorState::Stopping);
        let targets = self.stop_targets();
        for pid in &targets {
            if let Err(error) = self
                .collaborators
                .processes
                .signal(*pid, Termination::Graceful)
            {
                warn!(target: LIFECYCLE_TARGET, pid, error = %error, "SIGTERM failed");
            }
        }
        if !targets.is_empty() {
            thread::sleep(self.settings.timings.stop_grace);
        }
        let survivors = self.stop_targets();
        self.reap_exited();
        self.rest();

        let report = StopReport::new(
            targets.into_iter().collect(),
            survivors.into_iter().collect(),
        );
        if report.is_complete() {
            info!(target: LIFECYCLE_TARGET, signalled = ?report.signalled(), "worker stopped");
        } else {
            warn!(
                target: LIFECYCLE_TARGET,
                survivors = ?report.survivors(),
                "teardown incomplete"
            );
        }
        report
    }

    /// Stop, build, start and a lenient health check.
    ///
    /// The stop step is best effort; build and start failures abort the
    /// sequence and are recorded in the report.
    pub fn restart(&mut self, clean: bool) -> OperationReport {
        let mut report = OperationReport::new(Operation::Restart);
        let stopped = self.stop();
        let outcome = if stopped.is_complete() {
            StepOutcome::Succeeded(stopped.to_string())
        } else {
            StepOutcome::Partial(stopped.to_string())
        };
        report.record(Step::Stop, outcome);

        match self.build(clean) {
            Ok(output) => report.record(Step::Build, describe_build(&output)),
            Err(error) => return report.fail(Step::Build, error),
        }
        match self.start() {
            Ok(pid) => report.record(Step::Start, StepOutcome::Succeeded(format!("pid {pid}"))),
            Err(error) => return report.fail(Step::Start, error),
        }
        thread::sleep(self.settings.timings.restart_settle);
        report.verified(self.verify(Strictness::Lenient));
        report
    }

    /// Coarse recovery: force-kill every process matching the recovery tag,
    /// reclaim the port, clean build, start and verify leniently.
    ///
    /// This kills more than strictly necessary and is meant as a last resort.
    pub fn force_recover(&mut self) -> OperationReport {
        let mut report = OperationReport::new(Operation::ForceRecover);
        self.transition(SupervisorState::Recovering);
        report.record(Step::Kill, self.kill_recovery_targets());
        thread::sleep(self.settings.timings.force_kill_wait);
        self.reap_exited();

        let port = self.settings.port;
        let reclaimed = self.reclaimer.reclaim(port);
        if !reclaimed.released() {
            self.rest();
            return report.fail(Step::Reclaim, SupervisorError::PortStillBound { port });
        }
        let mut detail = format!(
            "port {port} free; terminated {} holder(s)",
            reclaimed.killed().len()
        );
        if reclaimed.lookup_failed() {
            detail.push_str("; owner lookup failed");
        }
        let outcome = if reclaimed.is_complete() {
            StepOutcome::Succeeded(detail)
        } else {
            StepOutcome::Partial(detail)
        };
        report.record(Step::Reclaim, outcome);

        match self.build(true) {
            Ok(output) => report.record(Step::Build, describe_build(&output)),
            Err(error) => return report.fail(Step::Build, error),
        }
        match self.start() {
            Ok(pid) => report.record(Step::Start, StepOutcome::Succeeded(format!("pid {pid}"))),
            Err(error) => return report.fail(Step::Start, error),
        }
        thread::sleep(self.settings.timings.recover_settle);
        report.verified(self.verify(Strictness::Lenient));
        report
    }

    /// Health, completed-unit count and recent log lines.
    ///
    /// A worker that exited without [`stop`](Self::stop) is detached first,
    /// so a crash shows up as an unhealthy verdict.
    pub fn status(&mut self, strictness: Strictness, tail_lines: usize) -> StatusReport {
        if let Some(pid) = self.reap_exited() {
            warn!(target: LIFECYCLE_TARGET, pid, "worker exited without stop");
            self.rest();
        }
        let verdict = self.verifier.check(&self.health_target(), strictness);
        let log_path = self.settings.layout.log_path().to_path_buf();

        let streaming = self
            .worker
            .as_ref()
            .is_some_and(|worker| worker.mode() == LaunchMode::Stream);
        let (recent_logs, completed) = if streaming {
            (self.buffer.tail(tail_lines), self.buffer.completed_units())
        } else {
            let lines = tail_log(&log_path, tail_lines).unwrap_or_else(|error| {
                warn!(target: LIFECYCLE_TARGET, error = %error, "log tail unavailable");
                Vec::new()
            });
            let count = count_marker(&log_path, &self.settings.completion_marker)
                .unwrap_or_else(|error| {
                    warn!(target: LIFECYCLE_TARGET, error = %error, "completion count unavailable");
                    0
                });
            (lines, count)
        };

        StatusReport {
            health: verdict.with_completed_units(completed),
            state: self.state,
            worker_pid: self.worker.as_ref().map(WorkerHandle::pid),
            log_path,
            recent_logs,
        }
    }

    fn verify(&mut self, strictness: Strictness) -> HealthStatus {
        self.transition(SupervisorState::Verifying);
        let verdict = self.verifier.check(&self.health_target(), strictness);
        self.rest();
        verdict
    }

    fn health_target(&self) -> HealthTarget {
        HealthTarget {
            process_tag: self.settings.process_tag.clone(),
            port: self.settings.port,
            probe_url: self.settings.probe_url.clone(),
            timeout: self.settings.timings.probe_timeout,
        }
    }

    fn stop_targets(&self) -> BTreeSet<u32> {
        let mut targets: BTreeSet<u32> = [&self.settings.process_tag, &self.settings.entry_tag]
            .into_iter()
            .flat_map(|tag| self.find_quietly(tag))
            .collect();
        if let Some(worker) = self.worker.as_ref().filter(|worker| worker.is_running()) {
            targets.insert(worker.pid());
        }
        targets
    }

    fn kill_recovery_targets(&self) -> StepOutcome {
        let (mut targets, lookup_failed) =
            match self.collaborators.processes.find(&self.settings.recovery_tag) {
                Ok(pids) => (pids.into_iter().collect::<BTreeSet<u32>>(), false),
                Err(error) => {
                    warn!(target: LIFECYCLE_TARGET, error = %error, "recovery lookup failed");
                    (BTreeSet::new(), true)
                }
            };
        if let Some(worker) = self.worker.as_ref().filter(|worker| worker.is_running()) {
            targets.insert(worker.pid());
        }
        let killed: Vec<u32> = targets
            .iter()
            .copied()
            .filter(|pid| {
                self.collaborators
                    .processes
                    .signal(*pid, Termination::Forced)
                    .map_err(|error| {
                        warn!(target: LIFECYCLE_TARGET, pid, error = %error, "SIGKILL failed");
                    })
                    .is_ok()
            })
            .collect();
        info!(target: LIFECYCLE_TARGET, ?killed, "recovery targets killed");

        let detail = format!("killed {} process(es)", killed.len());
        if lookup_failed || killed.len() < targets.len() {
            StepOutcome::Partial(detail)
        } else {
            StepOutcome::Succeeded(detail)
        }
    }

    fn find_quietly(&self, tag: &str) -> Vec<u32> {
        self.collaborators
            .processes
            .find(tag)
            .unwrap_or_else(|error| {
                warn!(target: LIFECYCLE_TARGET, tag, error = %error, "process lookup failed");
                Vec::new()
            })
    }

    /// Detaches a worker whose process has exited, returning its PID.
    fn reap_exited(&mut self) -> Option<u32> {
        let worker = self.worker.take_if(|worker| !worker.is_running())?;
        let pid = worker.pid();
        self.discard(worker);
        Some(pid)
    }

    fn discard(&self, worker: WorkerHandle) {
        let pid = worker.pid();
        if !worker.release(self.settings.timings.streamer_join) {
            debug!(target: LIFECYCLE_TARGET, pid, "log streamer still draining");
        }
    }

    /// Returns to Running when a worker is attached, otherwise Idle.
    fn rest(&mut self) {
        let next = if self.worker.is_some() {
            SupervisorState::Running
        } else {
            SupervisorState::Idle
        };
        self.transition(next);
    }

    fn transition(&mut self, next: SupervisorState) {
        if self.state != next {
            info!(target: LIFECYCLE_TARGET, from = %self.state, to = %next, "state transition");
            self.state = next;
        }
    }
}

fn describe_build(output: &BuildOutput) -> StepOutcome {
    let kind = if output.clean { "clean build" } else { "build" };
    StepOutcome::Succeeded(format!(
        "{kind} finished in {:.1}s",
        output.elapsed.as_secs_f64()
    ))
}
