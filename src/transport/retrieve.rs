//! Fetches the benchmark results file, falling back to reading it over ssh.

use camino::Utf8PathBuf;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::command::{CommandError, CommandRunner};
use crate::endpoint::Endpoint;

use super::{Transport, open_parent};

/// Where the results live remotely and where to store them locally.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResultPaths {
    /// Remote results file; a leading `~/` is left for the remote shell.
    pub remote: String,
    /// Local destination for the downloaded copy.
    pub local: Utf8PathBuf,
}

/// Errors raised by a single retrieval path.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RetrievalError {
    /// Raised when a transfer or remote read exits unsuccessfully.
    #[error("{program} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Program that failed.
        program: String,
        /// Human readable exit status.
        status_text: String,
        /// Stderr captured from the program.
        stderr: String,
    },
    /// Raised when the downloaded copy cannot be read.
    #[error("failed to read {path}: {message}")]
    Read {
        /// Local path.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// Raised when the program cannot be started.
    #[error(transparent)]
    Runner(#[from] CommandError),
}

/// Outcome of result retrieval. Retrieval never fails the run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResultsOutcome {
    /// The results file was copied to `path`.
    Downloaded {
        /// Local copy.
        path: Utf8PathBuf,
        /// File contents.
        text: String,
    },
    /// The copy failed but the file was read over ssh.
    Streamed {
        /// Remote file contents.
        text: String,
    },
    /// Both retrieval paths failed.
    Unavailable {
        /// Why the copy failed.
        transfer: RetrievalError,
        /// Why the ssh read failed.
        fallback: RetrievalError,
    },
}

impl ResultsOutcome {
    /// Returns the retrieved text, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Downloaded { text, .. } | Self::Streamed { text } => Some(text),
            Self::Unavailable { .. } => None,
        }
    }
}

impl<R: CommandRunner> Transport<R> {
    /// Retrieves the results file.
    ///
    /// The file is first copied with `scp` over `copy_endpoint` and read back
    /// from disk. If either step fails it is read with `cat` over
    /// `shell_endpoint` instead. When both fail the outcome is
    /// [`ResultsOutcome::Unavailable`]; nothing is raised.
    pub async fn retrieve(
        &self,
        copy_endpoint: &Endpoint,
        shell_endpoint: &Endpoint,
        paths: &ResultPaths,
    ) -> ResultsOutcome {
        info!(remote = %paths.remote, local = %paths.local, "retrieving results");
        let transfer = match self.download(copy_endpoint, paths).await {
            Ok(text) => {
                info!(local = %paths.local, "results downloaded");
                return ResultsOutcome::Downloaded {
                    path: paths.local.clone(),
                    text,
                };
            }
            Err(err) => err,
        };
        warn!(error = %transfer, "could not download results file; reading it over ssh");

        match self.read_remote(shell_endpoint, &paths.remote).await {
            Ok(text) => {
                info!("results read over ssh");
                ResultsOutcome::Streamed { text }
            }
            Err(fallback) => {
                error!(transfer = %transfer, fallback = %fallback, "could not retrieve results");
                ResultsOutcome::Unavailable { transfer, fallback }
            }
        }
    }

    async fn download(
        &self,
        endpoint: &Endpoint,
        paths: &ResultPaths,
    ) -> Result<String, RetrievalError> {
        let source = endpoint.remote_spec(&paths.remote);
        let args = self.scp_args(endpoint, &source, paths.local.as_str());
        let output = self.runner.run(&self.settings.scp_bin, &args).await?;
        if !output.is_success() {
            return Err(RetrievalError::CommandFailure {
                program: self.settings.scp_bin.clone(),
                status_text: output.status_text(),
                stderr: output.stderr.trim().to_owned(),
            });
        }

        let read_error = |message: String| RetrievalError::Read {
            path: paths.local.clone(),
            message,
        };
        let (dir, name) = open_parent(&paths.local).map_err(|err| read_error(err.to_string()))?;
        dir.read_to_string(&name)
            .map_err(|err| read_error(err.to_string()))
    }

    async fn read_remote(
        &self,
        endpoint: &Endpoint,
        remote_path: &str,
    ) -> Result<String, RetrievalError> {
        let command = format!("cat {}", remote_path_arg(remote_path));
        let args = self.ssh_args(endpoint, &command);
        let output = self.runner.run(&self.settings.ssh_bin, &args).await?;
        if output.is_success() {
            return Ok(output.stdout);
        }
        Err(RetrievalError::CommandFailure {
            program: self.settings.ssh_bin.clone(),
            status_text: output.status_text(),
            stderr: output.stderr.trim().to_owned(),
        })
    }
}

/// Quotes a remote path for the remote shell while keeping a leading `~/`
/// expandable.
pub(super) fn remote_path_arg(path: &str) -> String {
    path.strip_prefix("~/").map_or_else(
        || shell_escape::unix::escape(path.into()).into_owned(),
        |rest| format!("~/{}", shell_escape::unix::escape(rest.into())),
    )
}
