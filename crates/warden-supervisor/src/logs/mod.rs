//! Worker log capture: the bounded session buffer, the background streamer
//! that fills it, and helpers for reading the session log file.

mod buffer;
mod streamer;
mod tail;

pub use buffer::{LOG_BUFFER_CAPACITY, LOG_BUFFER_RETAIN, LogBuffer, LogLine};
pub(crate) use streamer::Capture;
pub use streamer::LogStreamer;
pub use tail::{count_marker, tail_log};

pub(crate) const LOGS_TARGET: &str = "warden::logs";
