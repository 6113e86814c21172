//! CLI argument definitions for the warden supervisor.

use clap::{Parser, Subcommand};

/// Default number of log lines shown by `status` and `logs`.
pub(crate) const DEFAULT_TAIL_LINES: usize = 20;

/// Command-line interface for the warden worker supervisor.
#[derive(Parser, Debug)]
#[command(name = "warden", disable_help_subcommand = true, version)]
pub(crate) struct Cli {
    /// The supervisor command to run.
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Supervisor commands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CliCommand {
    /// Launches the worker from the built artefact.
    Start {
        /// Stays attached, streaming worker output until it exits or the
        /// command is interrupted.
        #[arg(long)]
        follow: bool,
    },
    /// Stops every worker process gracefully.
    Stop,
    /// Builds the worker artefact.
    Build {
        /// Removes previous build output first.
        #[arg(long)]
        clean: bool,
    },
    /// Stops, rebuilds, starts and verifies the worker.
    Restart {
        /// Removes previous build output first.
        #[arg(long)]
        clean: bool,
        /// Follows worker output after verification instead of returning.
        #[arg(long)]
        follow: bool,
    },
    /// Reports worker health and the most recent log lines.
    Status {
        /// Treats a closed worker port as unhealthy.
        #[arg(long)]
        strict: bool,
        /// Number of log lines to show.
        #[arg(long, default_value_t = DEFAULT_TAIL_LINES)]
        lines: usize,
    },
    /// Force-kills every JVM, frees the port, rebuilds cleanly and starts.
    #[command(alias = "force-recover")]
    Fix {
        /// Follows worker output after verification instead of returning.
        #[arg(long)]
        follow: bool,
    },
    /// Prints the last lines of the session log.
    Logs {
        /// Number of log lines to show.
        #[arg(long, default_value_t = DEFAULT_TAIL_LINES)]
        lines: usize,
    },
}

impl CliCommand {
    /// Whether the command needs the build tool to be installed.
    pub(crate) const fn needs_build_tool(self) -> bool {
        matches!(
            self,
            Self::Build { .. } | Self::Restart { .. } | Self::Fix { .. }
        )
    }

    /// Whether the command launches a worker and stays attached to it.
    pub(crate) const fn follow_requested(self) -> bool {
        matches!(
            self,
            Self::Start { follow: true }
                | Self::Restart { follow: true, .. }
                | Self::Fix { follow: true }
        )
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(&["warden", "fix"])]
    #[case(&["warden", "force-recover"])]
    fn force_recover_is_an_alias_for_fix(#[case] args: &[&str]) {
        let cli = Cli::try_parse_from(args).expect("parse");
        assert_eq!(cli.command, CliCommand::Fix { follow: false });
    }

    #[test]
    fn status_defaults_to_lenient_with_twenty_lines() {
        let cli = Cli::try_parse_from(["warden", "status"]).expect("parse");
        assert_eq!(
            cli.command,
            CliCommand::Status {
                strict: false,
                lines: DEFAULT_TAIL_LINES
            }
        );
    }

    #[rstest]
    #[case(CliCommand::Build { clean: true }, true)]
    #[case(CliCommand::Restart { clean: false, follow: true }, true)]
    #[case(CliCommand::Fix { follow: false }, true)]
    #[case(CliCommand::Start { follow: false }, false)]
    #[case(CliCommand::Stop, false)]
    #[case(CliCommand::Status { strict: true, lines: 5 }, false)]
    fn build_tool_requirement_follows_the_command(
        #[case] command: CliCommand,
        #[case] expected: bool,
    ) {
        assert_eq!(command.needs_build_tool(), expected);
    }

    #[rstest]
    #[case(&["warden", "start"], false)]
    #[case(&["warden", "start", "--follow"], true)]
    #[case(&["warden", "restart", "--clean"], false)]
    #[case(&["warden", "fix", "--follow"], true)]
    #[case(&["warden", "status"], false)]
    fn launch_commands_return_unless_asked_to_follow(
        #[case] args: &[&str],
        #[case] expected: bool,
    ) {
        let cli = Cli::try_parse_from(args).expect("parse");
        assert_eq!(cli.command.follow_requested(), expected);
    }

    #[test]
    fn a_command_is_required() {
        assert!(Cli::try_parse_from(["warden"]).is_err());
    }
}
