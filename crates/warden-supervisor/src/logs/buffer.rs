use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Hard cap on buffered lines.
pub const LOG_BUFFER_CAPACITY: usize = 1000;

/// Lines kept when an append pushes the buffer past [`LOG_BUFFER_CAPACITY`].
pub const LOG_BUFFER_RETAIN: usize = 500;

/// A buffered log line and its position in the session stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    sequence: u64,
    text: String,
}

impl LogLine {
    /// Position of the line within the session, starting at zero.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Line content without the trailing newline.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Default)]
struct BufferState {
    lines: VecDeque<LogLine>,
    next_sequence: u64,
    completed: usize,
}

/// Bounded, ordered in-memory log of the current worker session.
///
/// The streamer is the only writer; readers take snapshots or follow the
/// stream with a sequence cursor. Completion markers are counted for the
/// whole session, including lines already evicted.
#[derive(Debug)]
pub struct LogBuffer {
    state: Mutex<BufferState>,
    completion_marker: String,
}

impl LogBuffer {
    /// Creates an empty buffer that counts occurrences of `completion_marker`.
    #[must_use]
    pub fn new(completion_marker: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(BufferState::default()),
            completion_marker: completion_marker.into(),
        }
    }

    fn state(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a line, compacting to the most recent
    /// [`LOG_BUFFER_RETAIN`] lines once the cap is exceeded.
    pub fn push(&self, text: impl Into<String>) {
        let text = text.into();
        let occurrences = if self.completion_marker.is_empty() {
            0
        } else {
            text.matches(self.completion_marker.as_str()).count()
        };
        let mut state = self.state();
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.completed += occurrences;
        state.lines.push_back(LogLine { sequence, text });
        if state.lines.len() > LOG_BUFFER_CAPACITY {
            let excess = state.lines.len() - LOG_BUFFER_RETAIN;
            state.lines.drain(..excess);
        }
    }

    /// Number of buffered lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state().lines.len()
    }

    /// Reports whether the buffer holds no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state().lines.is_empty()
    }

    /// Copies out the most recent `limit` lines, oldest first.
    #[must_use]
    pub fn tail(&self, limit: usize) -> Vec<String> {
        let state = self.state();
        let skip = state.lines.len().saturating_sub(limit);
        state
            .lines
            .iter()
            .skip(skip)
            .map(|line| line.text.clone())
            .collect()
    }

    /// Returns the buffered lines at or after `cursor` together with the
    /// cursor to pass on the next call.
    ///
    /// Lines evicted before the reader caught up are skipped silently.
    #[must_use]
    pub fn lines_since(&self, cursor: u64) -> (Vec<LogLine>, u64) {
        let state = self.state();
        let lines = state
            .lines
            .iter()
            .filter(|line| line.sequence >= cursor)
            .cloned()
            .collect();
        (lines, state.next_sequence)
    }

    /// Completion markers seen this session.
    #[must_use]
    pub fn completed_units(&self) -> usize {
        self.state().completed
    }

    /// Clears the buffer for a new session.
    pub fn reset(&self) {
        *self.state() = BufferState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(count: usize) -> LogBuffer {
        let buffer = LogBuffer::new("投递完成");
        for index in 0..count {
            buffer.push(format!("line {index}"));
        }
        buffer
    }

    #[test]
    fn holds_every_line_up_to_the_cap() {
        let buffer = filled(LOG_BUFFER_CAPACITY);
        assert_eq!(buffer.len(), LOG_BUFFER_CAPACITY);
    }

    #[test]
    fn exceeding_the_cap_keeps_the_most_recent_lines() {
        let buffer = filled(LOG_BUFFER_CAPACITY + 1);
        assert_eq!(buffer.len(), LOG_BUFFER_RETAIN);
        let tail = buffer.tail(LOG_BUFFER_RETAIN);
        assert_eq!(tail.first().map(String::as_str), Some("line 501"));
        assert_eq!(tail.last().map(String::as_str), Some("line 1000"));
    }

    #[test]
    fn length_never_exceeds_the_cap() {
        let buffer = LogBuffer::new("done");
        for index in 0..5_000 {
            buffer.push(format!("line {index}"));
            assert!(buffer.len() <= LOG_BUFFER_CAPACITY);
        }
    }

    #[test]
    fn cursor_follows_the_stream() {
        let buffer = filled(3);
        let (first, cursor) = buffer.lines_since(0);
        assert_eq!(first.len(), 3);
        assert_eq!(cursor, 3);

        buffer.push("line 3");
        let (next, cursor) = buffer.lines_since(cursor);
        assert_eq!(
            next.iter().map(LogLine::text).collect::<Vec<_>>(),
            vec!["line 3"]
        );
        assert_eq!(next.first().map(LogLine::sequence), Some(3));
        assert_eq!(cursor, 4);
    }

    #[test]
    fn completion_markers_survive_eviction() {
        let buffer = LogBuffer::new("投递完成");
        buffer.push("job 1 投递完成");
        for index in 0..LOG_BUFFER_CAPACITY {
            buffer.push(format!("noise {index}"));
        }
        buffer.push("job 2 投递完成");
        assert_eq!(buffer.completed_units(), 2);
    }

    #[test]
    fn every_marker_on_a_line_counts() {
        let buffer = LogBuffer::new("投递完成");
        buffer.push("A 投递完成, B 投递完成");
        buffer.push("C 投递完成");
        assert_eq!(buffer.completed_units(), 3);
    }

    #[test]
    fn reset_starts_a_fresh_session() {
        let buffer = filled(10);
        buffer.push("投递完成");
        buffer.reset();
        assert!(buffer.is_empty());
        assert_eq!(buffer.completed_units(), 0);
        assert_eq!(buffer.lines_since(0).1, 0);
    }
}
