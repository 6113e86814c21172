//! Configuration loading helpers for the warden CLI.
//!
//! Configuration flags come before the command name. They are split off and
//! handed to `ortho_config`, while the rest of the arguments go to the command
//! parser.

use std::ffi::{OsStr, OsString};

use ortho_config::OrthoConfig;
use warden_config::Config;

use crate::AppError;

/// CLI flags recognised by the configuration loader.
///
/// Keep in sync with the fields of [`warden_config::Config`].
pub(crate) const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--worker-root",
    "--worker-dir",
    "--log-dir",
    "--log-file",
    "--backend-port",
    "--startup-settle-secs",
    "--probe-path",
    "--process-tag",
    "--entry-tag",
    "--recovery-tag",
    "--artifact-primary",
    "--artifact-fallback",
    "--build-program",
    "--build-timeout-secs",
    "--launch-program",
    "--completion-marker",
    "--log-filter",
    "--log-format",
];

pub(crate) trait ConfigLoader {
    /// Loads configuration from the leading configuration flags.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Stop,
}

fn classify(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    if !text.starts_with("--") {
        return FlagAction::Stop;
    }
    let (flag, inline_value) = match text.split_once('=') {
        Some((flag, _)) => (flag, true),
        None => (text.as_ref(), false),
    };
    if CONFIG_CLI_FLAGS.contains(&flag) {
        FlagAction::Include {
            needs_value: !inline_value,
        }
    } else {
        FlagAction::Stop
    }
}

/// Arguments split between the configuration loader and the command parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConfigArgumentSplit {
    /// Program name followed by configuration flags.
    pub(crate) config_arguments: Vec<OsString>,
    /// Program name followed by the command and its flags.
    pub(crate) command_arguments: Vec<OsString>,
}

pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let mut remaining = args.iter();
    let program: Vec<OsString> = remaining.next().cloned().into_iter().collect();
    let mut config_arguments = program.clone();
    let mut command_arguments = program;

    while let Some(argument) = remaining.next() {
        match classify(argument) {
            FlagAction::Include { needs_value } => {
                config_arguments.push(argument.clone());
                if needs_value && let Some(value) = remaining.next() {
                    config_arguments.push(value.clone());
                }
            }
            FlagAction::Stop => {
                command_arguments.push(argument.clone());
                command_arguments.extend(remaining.cloned());
                break;
            }
        }
    }

    ConfigArgumentSplit {
        config_arguments,
        command_arguments,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[rstest]
    #[case("--backend-port=9000", FlagAction::Include { needs_value: false })]
    #[case("--backend-port", FlagAction::Include { needs_value: true })]
    #[case("status", FlagAction::Stop)]
    #[case("--strict", FlagAction::Stop)]
    fn flags_are_classified(#[case] argument: &str, #[case] expected: FlagAction) {
        assert_eq!(classify(OsStr::new(argument)), expected);
    }

    #[test]
    fn leading_config_flags_are_split_from_the_command() {
        let split = split_config_arguments(&os(&[
            "warden",
            "--backend-port",
            "9000",
            "--log-filter=debug",
            "status",
            "--lines",
            "5",
        ]));
        assert_eq!(
            split.config_arguments,
            os(&["warden", "--backend-port", "9000", "--log-filter=debug"])
        );
        assert_eq!(split.command_arguments, os(&["warden", "status", "--lines", "5"]));
    }

    #[test]
    fn config_flags_after_the_command_stay_with_the_command() {
        let split = split_config_arguments(&os(&["warden", "stop", "--backend-port", "1"]));
        assert_eq!(split.config_arguments, os(&["warden"]));
        assert_eq!(
            split.command_arguments,
            os(&["warden", "stop", "--backend-port", "1"])
        );
    }

    #[test]
    fn empty_arguments_split_into_nothing() {
        let split = split_config_arguments(&[]);
        assert!(split.config_arguments.is_empty());
        assert!(split.command_arguments.is_empty());
    }
}
