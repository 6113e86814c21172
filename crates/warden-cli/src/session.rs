//! Attached sessions: follow the worker's output until it exits or the
//! operator interrupts.

use std::io::Write;
use std::thread;
use std::time::Duration;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::info;
use warden_supervisor::{LogBuffer, Supervisor};

use crate::errors::AppError;

const SESSION_TARGET: &str = "warden::session";
const FOLLOW_INTERVAL: Duration = Duration::from_millis(200);

/// Why an attached session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    /// A termination signal arrived.
    Signalled(i32),
    /// The worker exited on its own.
    WorkerExited,
}

/// Streams buffered worker lines to `out` until the worker exits or a
/// termination signal arrives.
pub(crate) fn follow<W: Write>(
    supervisor: &Supervisor,
    out: &mut W,
) -> Result<SessionEnd, AppError> {
    let mut signals =
        Signals::new([SIGINT, SIGTERM, SIGHUP]).map_err(AppError::Signals)?;
    let buffer = supervisor.log_buffer();
    let mut cursor = 0;
    loop {
        cursor = drain(&buffer, cursor, out)?;
        if let Some(signal) = signals.pending().next() {
            info!(target: SESSION_TARGET, signal, "termination signal received");
            return Ok(SessionEnd::Signalled(signal));
        }
        if !supervisor.is_worker_running() {
            drain(&buffer, cursor, out)?;
            return Ok(SessionEnd::WorkerExited);
        }
        thread::sleep(FOLLOW_INTERVAL);
    }
}

fn drain<W: Write>(buffer: &LogBuffer, cursor: u64, out: &mut W) -> Result<u64, AppError> {
    let (lines, next) = buffer.lines_since(cursor);
    for line in &lines {
        writeln!(out, "{}", line.text())?;
    }
    out.flush()?;
    Ok(next)
}
