//! Runs the payload's fixed command sequence over `ssh`.

use shell_escape::unix::escape;
use thiserror::Error;
use tracing::info;

use crate::command::{CommandError, CommandRunner};
use crate::endpoint::Endpoint;

use super::Transport;

/// Errors raised while running remote commands.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ExecError {
    /// Raised when a remote command exits unsuccessfully.
    #[error("remote command '{command}' exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Remote command that failed.
        command: String,
        /// Human readable exit status.
        status_text: String,
        /// Stderr captured from `ssh`.
        stderr: String,
    },
    /// Raised when `ssh` cannot be started.
    #[error(transparent)]
    Runner(#[from] CommandError),
}

/// Builds the remote command sequence for a payload script.
///
/// The script is made executable and then run from the home directory with
/// its combined output mirrored into `log_file`. `pipefail` keeps the
/// script's own exit status instead of `tee`'s.
#[must_use]
pub fn payload_commands(script: &str, log_file: &str) -> Vec<String> {
    let escaped_script = escape(script.into());
    let escaped_log = escape(log_file.into());
    let pipeline = format!("cd ~ && ./{escaped_script} 2>&1 | tee {escaped_log}");
    vec![
        format!("chmod +x ~/{escaped_script}"),
        format!("bash -o pipefail -c {}", escape(pipeline.into())),
    ]
}

impl<R: CommandRunner> Transport<R> {
    /// Runs `commands` in order on `endpoint`.
    ///
    /// Output is shown live through [`CommandRunner::run_streaming`] and not
    /// inspected; the remote log file is the durable record.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::CommandFailure`] for the first command that exits
    /// unsuccessfully; later commands are not run.
    pub async fn execute(&self, endpoint: &Endpoint, commands: &[String]) -> Result<(), ExecError> {
        for command in commands {
            info!(%endpoint, command = %command, "executing remote command");
            let args = self.ssh_args(endpoint, command);
            let output = self
                .runner
                .run_streaming(&self.settings.ssh_bin, &args)
                .await?;
            if !output.is_success() {
                return Err(ExecError::CommandFailure {
                    command: command.clone(),
                    status_text: output.status_text(),
                    stderr: output.stderr.trim().to_owned(),
                });
            }
        }
        Ok(())
    }
}
