//! Command-line runtime for the warden worker supervisor.
//!
//! The runtime parses arguments, loads layered configuration, installs
//! telemetry and drives a [`Supervisor`] for one command. Commands that
//! launch the worker return once it is verified, leaving it writing the
//! session log. With `--follow` they stay attached instead, streaming its
//! output until it exits or the operator interrupts, at which point the
//! worker is stopped.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use warden_config::Config;
use warden_supervisor::{
    Collaborators, LaunchMode, OperationReport, Strictness, Supervisor,
    SupervisorSettings, tail_log,
};

mod cli;
mod config;
mod errors;
mod output;
mod session;
mod telemetry;

use cli::{Cli, CliCommand};
use config::{ConfigLoader, OrthoConfigLoader, split_config_arguments};
pub(crate) use errors::AppError;
use session::SessionEnd;

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader)
}

pub(crate) fn run_with_loader<I, W, E, L>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let split = split_config_arguments(&args);

    let cli = match Cli::try_parse_from(&split.command_arguments) {
        Ok(cli) => cli,
        Err(error)
            if matches!(
                error.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            ) =>
        {
            let _ = write!(stdout, "{error}");
            return ExitCode::SUCCESS;
        }
        Err(error) => {
            let _ = write!(stderr, "{}", AppError::CliUsage(error));
            return ExitCode::FAILURE;
        }
    };

    let result = loader
        .load(&split.config_arguments)
        .and_then(|config| {
            telemetry::initialise(&config)?;
            execute(cli.command, &config, stdout)
        });

    match result {
        Ok(exit_code) => exit_code,
        Err(error) => {
            let _ = writeln!(stderr, "warden: {error}");
            ExitCode::FAILURE
        }
    }
}

fn execute<W: Write>(
    command: CliCommand,
    config: &Config,
    out: &mut W,
) -> Result<ExitCode, AppError> {
    if let CliCommand::Logs { lines } = command {
        return show_logs(config, lines, out);
    }

    let mode = if command.follow_requested() {
        LaunchMode::Stream
    } else {
        LaunchMode::Detached
    };
    let settings = SupervisorSettings::from_config(config).with_launch_mode(mode);
    let mut supervisor = Supervisor::new(settings, Collaborators::system(config));
    supervisor.check_environment(command.needs_build_tool())?;

    match command {
        CliCommand::Start { follow } => {
            let pid = supervisor.start()?;
            match supervisor.worker() {
                Some(worker) => output::render_started(out, worker)?,
                None => writeln!(out, "worker started (pid {pid})")?,
            }
            let status = supervisor.status(Strictness::Lenient, 0);
            output::render_health(out, &status.health)?;
            if !follow {
                return Ok(ExitCode::SUCCESS);
            }
            attach(&mut supervisor, out)
        }
        CliCommand::Stop => {
            let report = supervisor.stop();
            output::render_stop(out, &report)?;
            if report.is_complete() {
                Ok(ExitCode::SUCCESS)
            } else {
                Err(AppError::TeardownIncomplete {
                    survivors: report.survivors().to_vec(),
                })
            }
        }
        CliCommand::Build { clean } => {
            let build = supervisor.build(clean)?;
            output::render_build(out, &build)?;
            Ok(ExitCode::SUCCESS)
        }
        CliCommand::Restart { clean, follow } => {
            let report = supervisor.restart(clean);
            finish_operation(&mut supervisor, &report, follow, out)
        }
        CliCommand::Fix { follow } => {
            let report = supervisor.force_recover();
            finish_operation(&mut supervisor, &report, follow, out)
        }
        CliCommand::Status { strict, lines } => {
            let strictness = if strict {
                Strictness::Strict
            } else {
                Strictness::Lenient
            };
            let status = supervisor.status(strictness, lines);
            output::render_status(out, &status)?;
            if status.health.is_healthy() {
                Ok(ExitCode::SUCCESS)
            } else {
                Err(AppError::Unhealthy {
                    health: status.health.health(),
                    diagnostic: status.health.diagnostic().to_owned(),
                })
            }
        }
        CliCommand::Logs { lines } => show_logs(config, lines, out),
    }
}

fn finish_operation<W: Write>(
    supervisor: &mut Supervisor,
    report: &OperationReport,
    follow: bool,
    out: &mut W,
) -> Result<ExitCode, AppError> {
    output::render_operation(out, report)?;
    if let Some(step) = report.failed_step() {
        return Err(AppError::OperationFailed {
            operation: report.operation(),
            step,
        });
    }
    if !follow {
        return Ok(ExitCode::SUCCESS);
    }
    attach(supervisor, out)
}

fn attach<W: Write>(supervisor: &mut Supervisor, out: &mut W) -> Result<ExitCode, AppError> {
    match session::follow(supervisor, out)? {
        SessionEnd::Signalled(_) => {
            let report = supervisor.stop();
            output::render_stop(out, &report)?;
            if report.is_complete() {
                Ok(ExitCode::SUCCESS)
            } else {
                Err(AppError::TeardownIncomplete {
                    survivors: report.survivors().to_vec(),
                })
            }
        }
        SessionEnd::WorkerExited => {
            let pid = supervisor.worker().map_or(0, |worker| worker.pid());
            let status = supervisor.status(Strictness::Lenient, 0);
            output::render_health(out, &status.health)?;
            Err(AppError::WorkerExited { pid })
        }
    }
}

fn show_logs<W: Write>(config: &Config, lines: usize, out: &mut W) -> Result<ExitCode, AppError> {
    let layout = config.layout();
    let path = layout.log_path();
    if !path.is_file() {
        return Err(AppError::MissingLog {
            path: path.to_path_buf(),
        });
    }
    let recent = tail_log(path, lines).map_err(|source| AppError::ReadLog {
        path: path.to_path_buf(),
        source,
    })?;
    output::render_lines(out, &recent)?;
    Ok(ExitCode::SUCCESS)
}
