use duct::cmd;
use log::trace;
use mockall::automock;
use std::fmt::{self, Display};
use thiserror::Error;

/// The result of a finished external command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandOutput {
    /// The exit code, `-1` if the process was killed by a signal.
    pub code: i32,
    /// Stdout and stderr merged, trailing whitespace removed.
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// A command line, only used for printing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandLine(pub Vec<String>);

impl CommandLine {
    pub fn new(program: &str, args: &[String]) -> Self {
        let mut parts = vec![program.to_string()];
        parts.extend(args.iter().cloned());
        CommandLine(parts)
    }
}

impl Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

/// Custom error describing the error cases for running commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command could not be started (e.g. the binary is missing).
    #[error("cannot run {0}: {1}")]
    StartFailure(CommandLine, #[source] std::io::Error),
}

/// Runs external programs and captures their output.
///
/// A non-zero exit code is not an error here, it is part of the [CommandOutput].
#[automock]
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, CommandError>;
}

/// Runs commands as subprocesses, without a shell.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, CommandError> {
        let line = CommandLine::new(program, args);
        trace!("Running {line}.");

        let output = cmd(program, args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin_null()
            .stderr_to_stdout()
            .stdout_capture()
            .unchecked()
            .run()
            .map_err(|err| CommandError::StartFailure(line, err))?;

        let output_str = String::from_utf8_lossy(&output.stdout)
            .trim_end()
            .to_string();

        Ok(CommandOutput {
            code: output.status.code().unwrap_or(-1),
            output: output_str,
        })
    }
}
