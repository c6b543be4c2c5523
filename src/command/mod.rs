//! External command execution.
//!
//! Every interaction with the outside world goes through [`CommandRunner`]:
//! the `vastai` CLI, `ssh`, and `scp`. The process-backed runner logs each
//! invocation before it starts and records the captured streams afterwards,
//! so the run log alone is enough to diagnose a failure. Long-running remote
//! payloads go through [`CommandRunner::run_streaming`] instead, which the
//! process runner hands to [`StreamingCommandRunner`] so output reaches the
//! terminal as it is produced.

use std::ffi::OsString;
use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use shell_escape::unix::escape;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

mod streaming;

pub use streaming::StreamingCommandRunner;

/// Result of running an external command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Human readable exit status, `unknown` when the process was killed by a
    /// signal.
    #[must_use]
    pub fn status_text(&self) -> String {
        self.code
            .map_or_else(|| String::from("unknown"), |code| code.to_string())
    }
}

/// Errors raised when a command cannot be run at all.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CommandError {
    /// Raised when a command cannot be spawned.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Command that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when a running command's streams cannot be read.
    #[error("i/o failure while running {program}: {message}")]
    Io {
        /// Command being run.
        program: String,
        /// Operating system error string.
        message: String,
    },
}

/// Future returned by [`CommandRunner::run`].
pub type CommandFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CommandOutput, CommandError>> + Send + 'a>>;

/// Abstraction over command execution to support fakes in tests.
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with the given arguments, capturing stdout and stderr.
    ///
    /// A non-zero exit is not an error at this level; callers inspect
    /// [`CommandOutput::code`].
    fn run<'a>(&'a self, program: &'a str, args: &'a [OsString]) -> CommandFuture<'a>;

    /// Runs `program` with its output shown live as well as captured.
    ///
    /// Runners without a terminal to forward to capture as [`Self::run`] does.
    fn run_streaming<'a>(&'a self, program: &'a str, args: &'a [OsString]) -> CommandFuture<'a> {
        self.run(program, args)
    }
}

/// Real command runner that shells out to the host operating system.
///
/// Child processes are killed if the returned future is dropped, which is
/// what happens when an interrupt cancels the workflow mid-command.
#[derive(Clone, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run<'a>(&'a self, program: &'a str, args: &'a [OsString]) -> CommandFuture<'a> {
        Box::pin(async move {
            info!(command = %render_command(program, args), "running command");
            let output = Command::new(program)
                .args(args)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|err| {
                    warn!(program, error = %err, "command could not be started");
                    CommandError::Spawn {
                        program: program.to_owned(),
                        message: err.to_string(),
                    }
                })?;

            let captured = CommandOutput {
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            };
            log_captured(program, &captured);
            Ok(captured)
        })
    }

    fn run_streaming<'a>(&'a self, program: &'a str, args: &'a [OsString]) -> CommandFuture<'a> {
        StreamingCommandRunner.run(program, args)
    }
}

fn log_captured(program: &str, output: &CommandOutput) {
    let stdout = output.stdout.trim();
    let stderr = output.stderr.trim();
    if !stdout.is_empty() {
        debug!(program, stdout, "captured stdout");
    }
    if !stderr.is_empty() {
        debug!(program, stderr, "captured stderr");
    }
    if !output.is_success() {
        warn!(
            program,
            status = %output.status_text(),
            stderr,
            "command exited unsuccessfully"
        );
    }
}

/// Renders a program and its arguments as a copy-pasteable shell line.
#[must_use]
pub fn render_command(program: &str, args: &[OsString]) -> String {
    let mut rendered = String::from(program);
    for arg in args {
        let text = arg.to_string_lossy();
        rendered.push(' ');
        rendered.push_str(escape(text).as_ref());
    }
    rendered
}
