use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use nix::fcntl::OFlag;
use nix::unistd::pipe2;
use tracing::info;
use warden_config::WorkerLayout;

use super::LIFECYCLE_TARGET;
use super::handle::WorkerHandle;
use crate::error::LaunchError;
use crate::logs::{Capture, LogBuffer, LogStreamer};

/// How the worker's output is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaunchMode {
    /// Merged stdout/stderr flow through the supervisor into the log buffer
    /// and the session log.
    #[default]
    Stream,
    /// The worker writes the session log itself in its own process group and
    /// outlives the supervisor.
    Detached,
}

/// Picks the primary artefact, else the fallback.
///
/// # Errors
///
/// Returns [`LaunchError::ArtifactMissing`] when neither exists.
pub fn resolve_artifact(layout: &WorkerLayout) -> Result<PathBuf, LaunchError> {
    [layout.artifact_primary(), layout.artifact_fallback()]
        .into_iter()
        .find(|candidate| candidate.is_file())
        .map(Path::to_path_buf)
        .ok_or_else(|| LaunchError::ArtifactMissing {
            primary: layout.artifact_primary().to_path_buf(),
            fallback: layout.artifact_fallback().to_path_buf(),
        })
}

/// Parameters for one launch.
pub(crate) struct LaunchRequest<'a> {
    pub program: &'a str,
    pub artifact: &'a Path,
    pub layout: &'a WorkerLayout,
    pub mode: LaunchMode,
}

/// Truncates the session log, spawns `<program> -jar <artifact>` in the
/// worker directory and attaches a streamer.
pub(crate) fn launch(
    request: &LaunchRequest<'_>,
    buffer: &Arc<LogBuffer>,
) -> Result<WorkerHandle, LaunchError> {
    let log_path = request.layout.log_path().to_path_buf();
    request.layout.prepare_log_dir()?;
    File::create(&log_path).map_err(|source| LaunchError::LogFile {
        path: log_path.clone(),
        source,
    })?;
    buffer.reset();

    let mut command = Command::new(request.program);
    command
        .arg("-jar")
        .arg(request.artifact)
        .current_dir(request.layout.worker_dir())
        .stdin(Stdio::null());

    let output = match request.mode {
        LaunchMode::Stream => {
            let (read, write) = pipe2(OFlag::O_CLOEXEC)
                .map_err(|errno| LaunchError::Pipe {
                    source: io::Error::from(errno),
                })?;
            let write_err = write
                .try_clone()
                .map_err(|source| LaunchError::Pipe { source })?;
            command.stdout(Stdio::from(write)).stderr(Stdio::from(write_err));
            Some(File::from(read))
        }
        LaunchMode::Detached => {
            let log = OpenOptions::new()
                .append(true)
                .open(&log_path)
                .map_err(|source| LaunchError::LogFile {
                    path: log_path.clone(),
                    source,
                })?;
            let log_err = log.try_clone().map_err(|source| LaunchError::LogFile {
                path: log_path.clone(),
                source,
            })?;
            command
                .stdout(Stdio::from(log))
                .stderr(Stdio::from(log_err))
                .process_group(0);
            None
        }
    };

    let child = command.spawn().map_err(|source| LaunchError::Spawn {
        program: request.program.to_owned(),
        source,
    })?;
    // The parent's copies of the write ends must close for end of stream to
    // reach the streamer.
    drop(command);

    let pid = child.id();
    let running = Arc::new(AtomicBool::new(true));
    let capture = match output {
        Some(output) => Capture::Stream {
            output: Box::new(output),
            buffer: Arc::clone(buffer),
            log_path: log_path.clone(),
        },
        None => Capture::Detached,
    };
    let streamer = LogStreamer::spawn(child, capture, Arc::clone(&running))
        .map_err(|source| LaunchError::Streamer { source })?;

    info!(
        target: LIFECYCLE_TARGET,
        pid,
        artifact = %request.artifact.display(),
        log = %log_path.display(),
        mode = ?request.mode,
        "worker launched"
    );
    Ok(WorkerHandle::new(
        pid,
        log_path,
        request.artifact.to_path_buf(),
        request.mode,
        running,
        streamer,
    ))
}
