use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::launch::LaunchMode;
use crate::logs::LogStreamer;

/// The single active worker, exclusively owned by the supervisor.
#[derive(Debug)]
pub struct WorkerHandle {
    pid: u32,
    launched_at: SystemTime,
    log_path: PathBuf,
    artifact: PathBuf,
    mode: LaunchMode,
    running: Arc<AtomicBool>,
    streamer: LogStreamer,
}

impl WorkerHandle {
    pub(crate) fn new(
        pid: u32,
        log_path: PathBuf,
        artifact: PathBuf,
        mode: LaunchMode,
        running: Arc<AtomicBool>,
        streamer: LogStreamer,
    ) -> Self {
        Self {
            pid,
            launched_at: SystemTime::now(),
            log_path,
            artifact,
            mode,
            running,
            streamer,
        }
    }

    /// Worker process ID.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// When the worker was launched.
    #[must_use]
    pub const fn launched_at(&self) -> SystemTime {
        self.launched_at
    }

    /// Launch time as an RFC 3339 UTC timestamp.
    #[must_use]
    pub fn launched_at_rfc3339(&self) -> String {
        OffsetDateTime::from(self.launched_at)
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::from("unknown"))
    }

    /// Session log file.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Artefact the worker runs.
    #[must_use]
    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    /// How the worker's output is captured.
    #[must_use]
    pub const fn mode(&self) -> LaunchMode {
        self.mode
    }

    /// Reports whether the worker process is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Joins the streamer within `timeout`, consuming the handle.
    pub(crate) fn release(self, timeout: Duration) -> bool {
        self.streamer.join_within(timeout)
    }
}
