use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Directory name appended to the home directory for the default worker root.
pub const DEFAULT_ROOT_DIR_NAME: &str = "zhitoujianli";

/// Root used when the home directory cannot be resolved.
pub const FALLBACK_WORKER_ROOT: &str = "/root/zhitoujianli";

/// Worker source directory relative to the worker root.
pub const DEFAULT_WORKER_DIR: &str = "backend/get_jobs";

/// Log directory relative to the worker root.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Session log file name inside the log directory.
pub const DEFAULT_LOG_FILE: &str = "backend.log";

/// Port the worker's HTTP listener binds.
pub const DEFAULT_BACKEND_PORT: u16 = 8080;

/// Seconds to wait after launch before the first health check.
pub const DEFAULT_STARTUP_SETTLE_SECS: u64 = 10;

/// Path probed on the worker to confirm the application layer responds.
pub const DEFAULT_PROBE_PATH: &str = "/api/status";

/// Command-line fragment identifying the worker process.
pub const DEFAULT_PROCESS_TAG: &str = "get_jobs";

/// Entry-point class name that also identifies worker processes.
pub const DEFAULT_ENTRY_TAG: &str = "WebApplication";

/// Broad command-line fragment killed during forced recovery.
pub const DEFAULT_RECOVERY_TAG: &str = "java";

/// Primary build artefact, relative to the worker directory.
pub const DEFAULT_ARTIFACT_PRIMARY: &str = "target/get_jobs-1.0-SNAPSHOT.jar";

/// Fallback build artefact for the older release naming scheme.
pub const DEFAULT_ARTIFACT_FALLBACK: &str = "target/get_jobs-v2.0.1.jar";

/// Build tool invoked to produce the artefact.
pub const DEFAULT_BUILD_PROGRAM: &str = "mvn";

/// Upper bound on a single build, in seconds.
pub const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 300;

/// Program that runs the artefact.
pub const DEFAULT_LAUNCH_PROGRAM: &str = "java";

/// Log line fragment emitted once per completed application.
pub const DEFAULT_COMPLETION_MARKER: &str = "投递完成";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Computes the default worker root beneath the operator's home directory.
pub fn worker_root() -> Utf8PathBuf {
    dirs::home_dir()
        .and_then(|home| Utf8PathBuf::from_path_buf(home).ok())
        .map_or_else(
            || Utf8PathBuf::from(FALLBACK_WORKER_ROOT),
            |home| home.join(DEFAULT_ROOT_DIR_NAME),
        )
}

/// Owned worker directory default for serde.
pub fn worker_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_WORKER_DIR)
}

/// Owned log directory default for serde.
pub fn log_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_LOG_DIR)
}

/// Owned log file name default for serde.
pub fn log_file() -> String {
    DEFAULT_LOG_FILE.to_owned()
}

/// Worker port default for serde.
pub const fn backend_port() -> u16 {
    DEFAULT_BACKEND_PORT
}

/// Settle duration default for serde.
pub const fn startup_settle_secs() -> u64 {
    DEFAULT_STARTUP_SETTLE_SECS
}

/// Probe path default for serde.
pub fn probe_path() -> String {
    DEFAULT_PROBE_PATH.to_owned()
}

/// Worker tag default for serde.
pub fn process_tag() -> String {
    DEFAULT_PROCESS_TAG.to_owned()
}

/// Entry tag default for serde.
pub fn entry_tag() -> String {
    DEFAULT_ENTRY_TAG.to_owned()
}

/// Recovery tag default for serde.
pub fn recovery_tag() -> String {
    DEFAULT_RECOVERY_TAG.to_owned()
}

/// Primary artefact default for serde.
pub fn artifact_primary() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_ARTIFACT_PRIMARY)
}

/// Fallback artefact default for serde.
pub fn artifact_fallback() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_ARTIFACT_FALLBACK)
}

/// Build program default for serde.
pub fn build_program() -> String {
    DEFAULT_BUILD_PROGRAM.to_owned()
}

/// Build timeout default for serde.
pub const fn build_timeout_secs() -> u64 {
    DEFAULT_BUILD_TIMEOUT_SECS
}

/// Launch program default for serde.
pub fn launch_program() -> String {
    DEFAULT_LAUNCH_PROGRAM.to_owned()
}

/// Completion marker default for serde.
pub fn completion_marker() -> String {
    DEFAULT_COMPLETION_MARKER.to_owned()
}

/// Default log filter expression used by the binaries.
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}
