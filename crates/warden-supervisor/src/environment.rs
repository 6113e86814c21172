//! Host prerequisite checks run before lifecycle commands.

use tracing::info;
use warden_config::WorkerLayout;

use crate::build::BuildTool;
use crate::error::EnvironmentError;

const ENVIRONMENT_TARGET: &str = "warden::environment";

/// Verifies the deployment directories exist and prepares the log directory.
///
/// When `build_tool` is supplied it must also answer a version query.
///
/// # Errors
///
/// Returns an [`EnvironmentError`] describing the first missing prerequisite.
pub fn check_requirements(
    layout: &WorkerLayout,
    build_tool: Option<&dyn BuildTool>,
) -> Result<(), EnvironmentError> {
    if !layout.root().is_dir() {
        return Err(EnvironmentError::MissingWorkerRoot {
            path: layout.root().to_path_buf(),
        });
    }
    if !layout.worker_dir().is_dir() {
        return Err(EnvironmentError::MissingWorkerDir {
            path: layout.worker_dir().to_path_buf(),
        });
    }
    layout.prepare_log_dir()?;

    if let Some(tool) = build_tool {
        let version = tool
            .version()
            .map_err(|source| EnvironmentError::BuildToolUnavailable {
                program: tool.program().to_owned(),
                source,
            })?;
        info!(
            target: ENVIRONMENT_TARGET,
            program = tool.program(),
            version = %version,
            "build tool available"
        );
    }
    Ok(())
}
