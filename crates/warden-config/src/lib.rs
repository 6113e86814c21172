//! Shared configuration for the warden supervisor.
//!
//! Settings are layered by `ortho_config`: built-in defaults, then a
//! `.warden.toml` file (or the file named by `--config-path`), then
//! `WARDEN_*` environment variables, then command-line flags. Both the
//! supervisor library and the CLI consume the resulting [`Config`].

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

mod defaults;
mod layout;
mod logging;

pub use defaults::{
    DEFAULT_ARTIFACT_FALLBACK, DEFAULT_ARTIFACT_PRIMARY, DEFAULT_BACKEND_PORT,
    DEFAULT_BUILD_PROGRAM, DEFAULT_BUILD_TIMEOUT_SECS, DEFAULT_COMPLETION_MARKER,
    DEFAULT_ENTRY_TAG, DEFAULT_LAUNCH_PROGRAM, DEFAULT_LOG_DIR, DEFAULT_LOG_FILE,
    DEFAULT_LOG_FILTER, DEFAULT_PROBE_PATH, DEFAULT_PROCESS_TAG, DEFAULT_RECOVERY_TAG,
    DEFAULT_STARTUP_SETTLE_SECS, DEFAULT_WORKER_DIR, default_log_filter,
    default_log_filter_string, default_log_format,
};
pub use layout::{LayoutError, WorkerLayout};
pub use logging::{LogFormat, LogFormatParseError};

/// Environment variable prefix shared by every setting.
pub const ENV_PREFIX: &str = "WARDEN";

/// Supervisor configuration.
///
/// Every field carries its default for both `serde` and `ortho_config`, so an
/// empty set of layers resolves to [`Config::default`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "WARDEN")]
pub struct Config {
    /// Root directory of the deployment.
    #[serde(default = "defaults::worker_root")]
    #[ortho_config(default = defaults::worker_root())]
    pub worker_root: Utf8PathBuf,
    /// Worker source directory, relative to the root unless absolute.
    #[serde(default = "defaults::worker_dir")]
    #[ortho_config(default = defaults::worker_dir())]
    pub worker_dir: Utf8PathBuf,
    /// Log directory, relative to the root unless absolute.
    #[serde(default = "defaults::log_dir")]
    #[ortho_config(default = defaults::log_dir())]
    pub log_dir: Utf8PathBuf,
    /// Session log file name.
    #[serde(default = "defaults::log_file")]
    #[ortho_config(default = defaults::log_file())]
    pub log_file: String,
    /// Port the worker listens on.
    #[serde(default = "defaults::backend_port")]
    #[ortho_config(default = defaults::backend_port())]
    pub backend_port: u16,
    /// Seconds to wait after launch before checking health.
    #[serde(default = "defaults::startup_settle_secs")]
    #[ortho_config(default = defaults::startup_settle_secs())]
    pub startup_settle_secs: u64,
    /// HTTP path probed to confirm the application responds.
    #[serde(default = "defaults::probe_path")]
    #[ortho_config(default = defaults::probe_path())]
    pub probe_path: String,
    /// Command-line fragment identifying worker processes.
    #[serde(default = "defaults::process_tag")]
    #[ortho_config(default = defaults::process_tag())]
    pub process_tag: String,
    /// Entry-point fragment that also identifies worker processes on stop.
    #[serde(default = "defaults::entry_tag")]
    #[ortho_config(default = defaults::entry_tag())]
    pub entry_tag: String,
    /// Broad fragment force-killed during recovery.
    #[serde(default = "defaults::recovery_tag")]
    #[ortho_config(default = defaults::recovery_tag())]
    pub recovery_tag: String,
    /// Primary artefact path, relative to the worker directory unless absolute.
    #[serde(default = "defaults::artifact_primary")]
    #[ortho_config(default = defaults::artifact_primary())]
    pub artifact_primary: Utf8PathBuf,
    /// Fallback artefact path, relative to the worker directory unless absolute.
    #[serde(default = "defaults::artifact_fallback")]
    #[ortho_config(default = defaults::artifact_fallback())]
    pub artifact_fallback: Utf8PathBuf,
    /// Build tool executable.
    #[serde(default = "defaults::build_program")]
    #[ortho_config(default = defaults::build_program())]
    pub build_program: String,
    /// Upper bound on a build, in seconds.
    #[serde(default = "defaults::build_timeout_secs")]
    #[ortho_config(default = defaults::build_timeout_secs())]
    pub build_timeout_secs: u64,
    /// Program that runs the artefact (`<program> -jar <artefact>`).
    #[serde(default = "defaults::launch_program")]
    #[ortho_config(default = defaults::launch_program())]
    pub launch_program: String,
    /// Log line fragment counted as one completed unit of work.
    #[serde(default = "defaults::completion_marker")]
    #[ortho_config(default = defaults::completion_marker())]
    pub completion_marker: String,
    /// `tracing` filter expression.
    #[serde(default = "defaults::default_log_filter_string")]
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Output format for supervisor logs.
    #[serde(default = "defaults::default_log_format")]
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_root: defaults::worker_root(),
            worker_dir: defaults::worker_dir(),
            log_dir: defaults::log_dir(),
            log_file: defaults::log_file(),
            backend_port: defaults::backend_port(),
            startup_settle_secs: defaults::startup_settle_secs(),
            probe_path: defaults::probe_path(),
            process_tag: defaults::process_tag(),
            entry_tag: defaults::entry_tag(),
            recovery_tag: defaults::recovery_tag(),
            artifact_primary: defaults::artifact_primary(),
            artifact_fallback: defaults::artifact_fallback(),
            build_program: defaults::build_program(),
            build_timeout_secs: defaults::build_timeout_secs(),
            launch_program: defaults::launch_program(),
            completion_marker: defaults::completion_marker(),
            log_filter: defaults::default_log_filter_string(),
            log_format: defaults::default_log_format(),
        }
    }
}

impl Config {
    /// Derived filesystem layout.
    #[must_use]
    pub fn layout(&self) -> WorkerLayout {
        WorkerLayout::from_config(self)
    }

    /// Wait between launch and the first health check.
    #[must_use]
    pub const fn startup_settle(&self) -> Duration {
        Duration::from_secs(self.startup_settle_secs)
    }

    /// Upper bound on a single build.
    #[must_use]
    pub const fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    /// URL probed on the local worker.
    #[must_use]
    pub fn probe_url(&self) -> String {
        let path = self.probe_path.trim_start_matches('/');
        format!("http://localhost:{}/{path}", self.backend_port)
    }

    /// Configured `tracing` filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Configured log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
