//! Shared fixtures: a temporary worker deployment driven by a shell script
//! standing in for the JVM, plus fakes for the port, probe and build
//! capabilities.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use tempfile::TempDir;
use warden_config::Config;

use crate::build::{BuildOutput, BuildTool};
use crate::error::BuildError;
use crate::lifecycle::{Collaborators, Supervisor, SupervisorSettings, Timings};
use crate::system::{
    HttpProbe, PortTable, ProbeOutcome, ProcessTable, SystemError, SystemProcessTable,
};

pub(crate) const TEST_PORT: u16 = 18_080;
pub(crate) const COMPLETION_MARKER: &str = "投递完成";
const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(25);

pub(crate) fn test_timings() -> Timings {
    Timings {
        startup_settle: Duration::from_millis(300),
        stop_grace: Duration::from_secs(1),
        restart_settle: Duration::ZERO,
        recover_settle: Duration::ZERO,
        force_kill_wait: Duration::from_millis(100),
        reclaim_grace: Duration::from_millis(200),
        reclaim_wait: Duration::from_secs(2),
        build_timeout: Duration::from_secs(5),
        probe_timeout: Duration::from_secs(1),
        streamer_join: Duration::from_secs(2),
    }
}

/// Polls `condition` until it holds or the wait times out.
pub(crate) fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(POLL_INTERVAL);
    }
    condition()
}

/// Port table whose listen state is either set directly or tied to a
/// holder process spawned by the test.
#[derive(Default)]
pub(crate) struct FakePorts {
    listening: AtomicBool,
    lookup_fails: AtomicBool,
    holder: Mutex<Option<Child>>,
}

impl FakePorts {
    pub(crate) fn set_listening(&self, listening: bool) {
        self.listening.store(listening, Ordering::SeqCst);
    }

    /// Makes every owner lookup fail as if `lsof` were missing.
    pub(crate) fn fail_owner_lookup(&self) {
        self.lookup_fails.store(true, Ordering::SeqCst);
    }

    /// Spawns a process that "holds" the port until it exits.
    pub(crate) fn spawn_holder(&self) -> u32 {
        let child = Command::new("sleep")
            .arg("30")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn port holder");
        let pid = child.id();
        *self.holder.lock().expect("holder lock") = Some(child);
        pid
    }

    fn holder_pid(&self) -> Option<u32> {
        let mut holder = self.holder.lock().expect("holder lock");
        let child = holder.as_mut()?;
        match child.try_wait() {
            Ok(None) => Some(child.id()),
            _ => None,
        }
    }
}

impl PortTable for FakePorts {
    fn is_listening(&self, _port: u16) -> bool {
        self.listening.load(Ordering::SeqCst) || self.holder_pid().is_some()
    }

    fn owners(&self, _port: u16) -> Result<Vec<u32>, SystemError> {
        if self.lookup_fails.load(Ordering::SeqCst) {
            return Err(SystemError::Command {
                program: String::from("lsof"),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        Ok(self.holder_pid().into_iter().collect())
    }
}

impl Drop for FakePorts {
    fn drop(&mut self) {
        if let Ok(mut holder) = self.holder.lock()
            && let Some(child) = holder.as_mut()
        {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

pub(crate) struct FakeProbe {
    outcome: Mutex<ProbeOutcome>,
}

impl FakeProbe {
    pub(crate) fn answering(outcome: ProbeOutcome) -> Self {
        Self {
            outcome: Mutex::new(outcome),
        }
    }

    pub(crate) fn set(&self, outcome: ProbeOutcome) {
        *self.outcome.lock().expect("probe lock") = outcome;
    }
}

impl HttpProbe for FakeProbe {
    fn probe(&self, _url: &str, _timeout: Duration) -> ProbeOutcome {
        self.outcome.lock().expect("probe lock").clone()
    }
}

/// Build capability that records invocations and, optionally, whether the
/// worker port was bound at the time.
pub(crate) struct FakeBuild {
    ports: Arc<FakePorts>,
    calls: Mutex<Vec<BuildCall>>,
    failure: Mutex<Option<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BuildCall {
    pub clean: bool,
    pub port_bound: bool,
}

impl FakeBuild {
    pub(crate) fn new(ports: Arc<FakePorts>) -> Self {
        Self {
            ports,
            calls: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        }
    }

    pub(crate) fn fail_with(&self, diagnostic: &str) {
        *self.failure.lock().expect("failure lock") = Some(diagnostic.to_owned());
    }

    pub(crate) fn calls(&self) -> Vec<BuildCall> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl BuildTool for FakeBuild {
    fn program(&self) -> &str {
        "fake-mvn"
    }

    fn version(&self) -> Result<String, BuildError> {
        Ok(String::from("Fake Maven 3.9.9"))
    }

    fn build(
        &self,
        _worker_dir: &Path,
        clean: bool,
        _timeout: Duration,
    ) -> Result<BuildOutput, BuildError> {
        self.calls.lock().expect("calls lock").push(BuildCall {
            clean,
            port_bound: self.ports.is_listening(TEST_PORT),
        });
        match self.failure.lock().expect("failure lock").clone() {
            Some(diagnostic) => Err(BuildError::Failed {
                status: Some(1),
                diagnostic,
            }),
            None => Ok(BuildOutput {
                clean,
                elapsed: Duration::from_millis(5),
            }),
        }
    }
}

/// Which artefacts exist in the temporary deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Artefacts {
    Primary,
    FallbackOnly,
    None,
}

/// A temporary deployment with a supervisor wired to fakes.
///
/// The fake worker is a shell script whose command line carries the
/// temporary directory path, which doubles as every process tag so that
/// parallel tests never see each other's workers.
pub(crate) struct SupervisorHarness {
    dir: TempDir,
    tag: String,
    pub ports: Arc<FakePorts>,
    pub probe: Arc<FakeProbe>,
    pub build: Arc<FakeBuild>,
    pub supervisor: Supervisor,
}

impl SupervisorHarness {
    pub(crate) fn new(artefacts: Artefacts) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir");
        let tag = format!("{root}/");
        let script = dir.path().join("fake-java");
        write_worker_script(
            &script,
            &dir.path().join("crash"),
            &dir.path().join("orphan"),
        );

        let config = Config {
            worker_root: root,
            backend_port: TEST_PORT,
            process_tag: tag.clone(),
            entry_tag: tag.clone(),
            recovery_tag: tag.clone(),
            launch_program: script.display().to_string(),
            completion_marker: String::from(COMPLETION_MARKER),
            ..Config::default()
        };
        let layout = config.layout();
        fs::create_dir_all(layout.worker_dir()).expect("worker dir");
        match artefacts {
            Artefacts::Primary => touch(layout.artifact_primary()),
            Artefacts::FallbackOnly => touch(layout.artifact_fallback()),
            Artefacts::None => {}
        }

        let ports = Arc::new(FakePorts::default());
        let probe = Arc::new(FakeProbe::answering(ProbeOutcome::Status(200)));
        let build = Arc::new(FakeBuild::new(Arc::clone(&ports)));
        let mut settings = SupervisorSettings::from_config(&config);
        settings.timings = test_timings();
        let collaborators = Collaborators {
            processes: Arc::new(SystemProcessTable::new()),
            ports: Arc::clone(&ports) as Arc<dyn PortTable>,
            probe: Arc::clone(&probe) as Arc<dyn HttpProbe>,
            build: Arc::clone(&build) as Arc<dyn BuildTool>,
        };
        Self {
            dir,
            tag,
            ports,
            probe,
            build,
            supervisor: Supervisor::new(settings, collaborators),
        }
    }

    /// Makes the running fake worker exit with a failure status.
    pub(crate) fn crash_worker(&self) {
        fs::write(self.dir.path().join("crash"), b"").expect("crash trigger");
    }

    /// Makes the fake worker leave a descendant holding its output open when
    /// it crashes.
    pub(crate) fn leave_descendant_on_crash(&self) {
        fs::write(self.dir.path().join("orphan"), b"").expect("orphan trigger");
    }

    /// Command-line fragment shared by every process of this deployment.
    pub(crate) fn tag(&self) -> &str {
        &self.tag
    }

    /// Live processes carrying this harness's tag.
    pub(crate) fn tagged_processes(&self) -> Vec<u32> {
        SystemProcessTable::new()
            .find(&self.tag)
            .expect("process table")
    }

    pub(crate) fn log_path(&self) -> PathBuf {
        self.supervisor.settings().layout.log_path().to_path_buf()
    }

    pub(crate) fn fallback_artifact(&self) -> PathBuf {
        self.supervisor
            .settings()
            .layout
            .artifact_fallback()
            .to_path_buf()
    }
}

impl Drop for SupervisorHarness {
    fn drop(&mut self) {
        let stray = SystemProcessTable::new()
            .find(&self.tag)
            .is_ok_and(|pids| !pids.is_empty());
        if stray || self.supervisor.is_worker_running() {
            self.supervisor.stop();
        }
    }
}

fn write_worker_script(path: &Path, crash_trigger: &Path, orphan_trigger: &Path) {
    let script = format!(
        "#!/bin/sh\n\
         echo \"worker booting\"\n\
         echo \"{COMPLETION_MARKER}: 1\"\n\
         while [ ! -f '{trigger}' ]; do sleep 0.1; done\n\
         echo \"worker crashed\" >&2\n\
         if [ -f '{orphan}' ]; then sleep 8 & fi\n\
         exit 3\n",
        trigger = crash_trigger.display(),
        orphan = orphan_trigger.display(),
    );
    fs::write(path, script).expect("write worker script");
    let mut permissions = fs::metadata(path).expect("script metadata").permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(path, permissions).expect("script permissions");
}

fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("artefact dir");
    }
    fs::write(path, b"PK").expect("artefact");
}
