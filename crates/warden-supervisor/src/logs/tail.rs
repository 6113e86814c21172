use std::fs;
use std::io;
use std::path::Path;

/// Reads the last `lines` lines of a session log.
///
/// A missing file yields no lines. Invalid UTF-8 is replaced rather than
/// rejected since the worker's output encoding is not under our control.
///
/// # Errors
///
/// Returns any IO error other than `NotFound`.
pub fn tail_log(path: &Path, lines: usize) -> io::Result<Vec<String>> {
    let Some(content) = read_lossy(path)? else {
        return Ok(Vec::new());
    };
    let all: Vec<&str> = content.lines().collect();
    let start = all.len().saturating_sub(lines);
    Ok(all
        .iter()
        .skip(start)
        .map(|line| line.trim_end().to_owned())
        .collect())
}

/// Counts occurrences of `marker` in the session log.
///
/// # Errors
///
/// Returns any IO error other than `NotFound`.
pub fn count_marker(path: &Path, marker: &str) -> io::Result<usize> {
    if marker.is_empty() {
        return Ok(0);
    }
    let Some(content) = read_lossy(path)? else {
        return Ok(0);
    };
    Ok(content.matches(marker).count())
}

fn read_lossy(path: &Path) -> io::Result<Option<String>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error),
    }
}
