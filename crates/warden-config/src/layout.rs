//! Derives the filesystem layout shared by the supervisor and the CLI.
//!
//! The worker root houses the worker sources, the build output and the log
//! directory. Relative settings are resolved against the root so operators can
//! relocate the whole deployment with a single override.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::Config;

/// Canonical paths for the supervised worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerLayout {
    root: PathBuf,
    worker_dir: PathBuf,
    log_dir: PathBuf,
    log_path: PathBuf,
    artifact_primary: PathBuf,
    artifact_fallback: PathBuf,
}

impl WorkerLayout {
    /// Derives the layout from configuration without touching the filesystem.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let root = config.worker_root.as_std_path().to_path_buf();
        let worker_dir = resolve(&root, config.worker_dir.as_std_path());
        let log_dir = resolve(&root, config.log_dir.as_std_path());
        Self {
            log_path: log_dir.join(&config.log_file),
            artifact_primary: resolve(&worker_dir, config.artifact_primary.as_std_path()),
            artifact_fallback: resolve(&worker_dir, config.artifact_fallback.as_std_path()),
            root,
            worker_dir,
            log_dir,
        }
    }

    /// Root directory of the deployment.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// Directory holding the worker sources; builds and launches run here.
    #[must_use]
    pub fn worker_dir(&self) -> &Path {
        self.worker_dir.as_path()
    }

    /// Directory receiving session log files.
    #[must_use]
    pub fn log_dir(&self) -> &Path {
        self.log_dir.as_path()
    }

    /// Session log file.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        self.log_path.as_path()
    }

    /// Artefact produced by the current release naming scheme.
    #[must_use]
    pub fn artifact_primary(&self) -> &Path {
        self.artifact_primary.as_path()
    }

    /// Artefact produced by the previous release naming scheme.
    #[must_use]
    pub fn artifact_fallback(&self) -> &Path {
        self.artifact_fallback.as_path()
    }

    /// Creates the log directory when it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::LogDirectory`] when the directory cannot be
    /// created.
    pub fn prepare_log_dir(&self) -> Result<&Path, LayoutError> {
        fs::create_dir_all(&self.log_dir).map_err(|source| LayoutError::LogDirectory {
            path: self.log_dir.clone(),
            source,
        })?;
        Ok(self.log_dir.as_path())
    }
}

fn resolve(base: &Path, candidate: &Path) -> PathBuf {
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    }
}

/// Errors raised while preparing the worker layout.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// Creating the log directory failed.
    #[error("failed to prepare log directory '{path}': {source}")]
    LogDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    #[test]
    fn relative_settings_resolve_against_root() {
        let config = Config {
            worker_root: Utf8PathBuf::from("/srv/jobs"),
            ..Config::default()
        };
        let layout = WorkerLayout::from_config(&config);
        assert_eq!(layout.worker_dir(), Path::new("/srv/jobs/backend/get_jobs"));
        assert_eq!(layout.log_path(), Path::new("/srv/jobs/logs/backend.log"));
        assert_eq!(
            layout.artifact_primary(),
            Path::new("/srv/jobs/backend/get_jobs/target/get_jobs-1.0-SNAPSHOT.jar")
        );
        assert_eq!(
            layout.artifact_fallback(),
            Path::new("/srv/jobs/backend/get_jobs/target/get_jobs-v2.0.1.jar")
        );
    }

    #[test]
    fn absolute_settings_are_kept() {
        let config = Config {
            worker_root: Utf8PathBuf::from("/srv/jobs"),
            log_dir: Utf8PathBuf::from("/var/log/warden"),
            ..Config::default()
        };
        let layout = WorkerLayout::from_config(&config);
        assert_eq!(layout.log_dir(), Path::new("/var/log/warden"));
    }

    #[test]
    fn prepare_log_dir_creates_missing_directory() {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir");
        let config = Config {
            worker_root: root,
            ..Config::default()
        };
        let layout = WorkerLayout::from_config(&config);
        let created = layout.prepare_log_dir().expect("log dir");
        assert!(created.is_dir());
    }
}
