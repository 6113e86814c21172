//! The build capability and its Maven implementation.

use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::BuildError;

const BUILD_TARGET: &str = "warden::build";
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const DIAGNOSTIC_LINES: usize = 50;

/// Summary of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    /// Whether previous build output was cleaned first.
    pub clean: bool,
    /// Wall-clock duration of the build.
    pub elapsed: Duration,
}

/// Produces the worker artefact from source.
pub trait BuildTool: Send + Sync {
    /// Executable invoked by the tool, for diagnostics.
    fn program(&self) -> &str;

    /// Queries the tool version to confirm it is installed.
    ///
    /// # Errors
    ///
    /// Returns a [`BuildError`] when the tool cannot be run or rejects the
    /// query.
    fn version(&self) -> Result<String, BuildError>;

    /// Builds the artefact in `worker_dir`, killing the build after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::TimedOut`] when the budget elapses and
    /// [`BuildError::Failed`] when the build exits unsuccessfully.
    fn build(
        &self,
        worker_dir: &Path,
        clean: bool,
        timeout: Duration,
    ) -> Result<BuildOutput, BuildError>;
}

/// Runs `<program> [clean] package -DskipTests -q`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MavenBuild {
    program: String,
}

impl MavenBuild {
    /// Builds a Maven runner using `program` as the executable.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn arguments(clean: bool) -> Vec<&'static str> {
        let mut args = Vec::with_capacity(4);
        if clean {
            args.push("clean");
        }
        args.extend(["package", "-DskipTests", "-q"]);
        args
    }
}

impl BuildTool for MavenBuild {
    fn program(&self) -> &str {
        &self.program
    }

    fn version(&self) -> Result<String, BuildError> {
        let output = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|source| BuildError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(BuildError::Failed {
                status: output.status.code(),
                diagnostic: diagnostic(&output.stdout, &output.stderr),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().trim().to_owned())
    }

    fn build(
        &self,
        worker_dir: &Path,
        clean: bool,
        timeout: Duration,
    ) -> Result<BuildOutput, BuildError> {
        let args = Self::arguments(clean);
        info!(
            target: BUILD_TARGET,
            program = %self.program,
            ?args,
            dir = %worker_dir.display(),
            "build starting"
        );
        let started = Instant::now();
        let mut child = Command::new(&self.program)
            .args(&args)
            .current_dir(worker_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| BuildError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        let status = loop {
            if let Some(status) = child
                .try_wait()
                .map_err(|source| BuildError::Wait { source })?
            {
                break status;
            }
            if started.elapsed() >= timeout {
                if let Err(error) = child.kill() {
                    warn!(target: BUILD_TARGET, error = %error, "failed to kill build");
                }
                if let Err(error) = child.wait() {
                    warn!(target: BUILD_TARGET, error = %error, "failed to reap build");
                }
                warn!(
                    target: BUILD_TARGET,
                    timeout_secs = timeout.as_secs(),
                    "build timed out"
                );
                return Err(BuildError::TimedOut { timeout });
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stdout = collect(stdout_reader);
        let stderr = collect(stderr_reader);
        finish(status, &stdout, &stderr, clean, started.elapsed())
    }
}

fn finish(
    status: ExitStatus,
    stdout: &[u8],
    stderr: &[u8],
    clean: bool,
    elapsed: Duration,
) -> Result<BuildOutput, BuildError> {
    if status.success() {
        info!(
            target: BUILD_TARGET,
            elapsed_ms = elapsed.as_millis(),
            "build succeeded"
        );
        return Ok(BuildOutput { clean, elapsed });
    }
    let diagnostic = diagnostic(stdout, stderr);
    warn!(
        target: BUILD_TARGET,
        code = status.code(),
        diagnostic = %diagnostic,
        "build failed"
    );
    Err(BuildError::Failed {
        status: status.code(),
        diagnostic,
    })
}

fn drain<R>(stream: Option<R>) -> Option<JoinHandle<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    stream.map(|mut stream| {
        thread::spawn(move || {
            let mut bytes = Vec::new();
            if let Err(error) = stream.read_to_end(&mut bytes) {
                debug!(target: BUILD_TARGET, error = %error, "build output truncated");
            }
            bytes
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

/// Prefers stderr, falling back to stdout, keeping the trailing lines.
fn diagnostic(stdout: &[u8], stderr: &[u8]) -> String {
    let errors = String::from_utf8_lossy(stderr);
    let chosen = if errors.trim().is_empty() {
        String::from_utf8_lossy(stdout)
    } else {
        errors
    };
    let lines: Vec<&str> = chosen.trim().lines().collect();
    let skip = lines.len().saturating_sub(DIAGNOSTIC_LINES);
    lines
        .iter()
        .skip(skip)
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
}
