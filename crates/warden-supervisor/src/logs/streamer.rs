use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::Child;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::LOGS_TARGET;
use super::buffer::LogBuffer;

const WAITER_THREAD: &str = "warden-worker-waiter";
const PUMP_THREAD: &str = "warden-log-pump";
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Where the worker's output goes while the streamer runs.
pub(crate) enum Capture {
    /// Read merged output from `output`, buffering it and appending it to the
    /// session log.
    Stream {
        output: Box<dyn Read + Send>,
        buffer: Arc<LogBuffer>,
        log_path: PathBuf,
    },
    /// The worker writes its own log file; only reap the process.
    Detached,
}

/// Background tasks bound to one worker process.
///
/// A waiter thread reaps the worker and clears the shared running flag as
/// soon as the process exits. Output is pumped on a separate thread, since
/// processes the worker spawned may keep the pipe open after it has gone.
#[derive(Debug)]
pub struct LogStreamer {
    waiter: JoinHandle<()>,
    pump: Option<JoinHandle<()>>,
    abandoned: Arc<AtomicBool>,
}

impl LogStreamer {
    pub(crate) fn spawn(
        mut child: Child,
        capture: Capture,
        running: Arc<AtomicBool>,
    ) -> io::Result<Self> {
        let abandoned = Arc::new(AtomicBool::new(false));
        let pump = match capture {
            Capture::Stream {
                output,
                buffer,
                log_path,
            } => {
                let stop = Arc::clone(&abandoned);
                let spawned = thread::Builder::new()
                    .name(PUMP_THREAD.to_owned())
                    .spawn(move || {
                        let mut sink = FileSink::new(log_path);
                        pump(output, &buffer, &mut sink, &stop);
                    });
                match spawned {
                    Ok(handle) => Some(handle),
                    Err(error) => {
                        abort(&mut child);
                        return Err(error);
                    }
                }
            }
            Capture::Detached => None,
        };
        let waiter = thread::Builder::new()
            .name(WAITER_THREAD.to_owned())
            .spawn(move || reap(&mut child, &running))?;
        Ok(Self {
            waiter,
            pump,
            abandoned,
        })
    }

    /// Reports whether the worker has been reaped and its output drained.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.waiter.is_finished() && self.pump.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Waits up to `timeout` for the worker to be reaped and its output
    /// drained, then joins both tasks.
    ///
    /// Returns `false` when either task is still running at the deadline. A
    /// pump left behind stops recording as soon as its next read returns.
    #[must_use]
    pub fn join_within(self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let reaped = join_by(self.waiter, deadline, "worker waiter");
        let drained = self
            .pump
            .is_none_or(|pump| join_by(pump, deadline, "log pump"));
        if !drained {
            self.abandoned.store(true, Ordering::SeqCst);
        }
        reaped && drained
    }
}

fn abort(child: &mut Child) {
    if let Err(error) = child.kill().and_then(|()| child.wait().map(drop)) {
        warn!(target: LOGS_TARGET, pid = child.id(), error = %error, "failed to abort worker");
    }
}

fn join_by(handle: JoinHandle<()>, deadline: Instant, task: &str) -> bool {
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!(target: LOGS_TARGET, task, "streamer task still running; detaching");
            return false;
        }
        thread::sleep(JOIN_POLL_INTERVAL);
    }
    if handle.join().is_err() {
        warn!(target: LOGS_TARGET, task, "streamer task panicked");
    }
    true
}

fn pump(output: impl Read, buffer: &LogBuffer, sink: &mut FileSink, abandoned: &AtomicBool) {
    let mut reader = BufReader::new(output);
    let mut raw = Vec::new();
    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw) {
            Ok(0) => break,
            Ok(_) if abandoned.load(Ordering::SeqCst) => break,
            Ok(_) => {
                let decoded = String::from_utf8_lossy(&raw);
                let line = decoded.trim_end();
                sink.write_line(line);
                buffer.push(line);
            }
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => {
                warn!(
                    target: LOGS_TARGET,
                    error = %error,
                    "worker output stream failed"
                );
                break;
            }
        }
    }
}

fn reap(child: &mut Child, running: &AtomicBool) {
    let pid = child.id();
    match child.wait() {
        Ok(status) => info!(
            target: LOGS_TARGET,
            pid,
            code = status.code(),
            "worker exited"
        ),
        Err(error) => warn!(
            target: LOGS_TARGET,
            pid,
            error = %error,
            "failed to reap worker"
        ),
    }
    running.store(false, Ordering::SeqCst);
}

/// Best-effort appender for the session log.
struct FileSink {
    path: PathBuf,
    file: Option<File>,
    failing: bool,
}

impl FileSink {
    const fn new(path: PathBuf) -> Self {
        Self {
            path,
            file: None,
            failing: false,
        }
    }

    fn write_line(&mut self, line: &str) {
        match self.append(line) {
            Ok(()) => {
                if self.failing {
                    info!(
                        target: LOGS_TARGET,
                        file = %self.path.display(),
                        "session log writable again"
                    );
                }
                self.failing = false;
            }
            Err(error) => {
                if !self.failing {
                    warn!(
                        target: LOGS_TARGET,
                        file = %self.path.display(),
                        error = %error,
                        "failed to append to session log"
                    );
                }
                self.failing = true;
                self.file = None;
            }
        }
    }

    fn append(&mut self, line: &str) -> io::Result<()> {
        if self.file.is_none() {
            let opened = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.file = Some(opened);
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(line.as_bytes())?;
            file.write_all(b"\n")?;
        }
        Ok(())
    }
}
