//! Uploads payload files to the instance home directory.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::info;

use crate::command::{CommandError, CommandRunner};
use crate::endpoint::Endpoint;

use super::{Transport, open_parent};

/// Remote directory payload files are copied into.
const REMOTE_HOME: &str = "~/";

/// Errors raised while staging files.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum StageError {
    /// Raised when a required local file does not exist.
    #[error("required file not found: {path}")]
    MissingFile {
        /// Path that was expected to exist.
        path: Utf8PathBuf,
    },
    /// Raised when a local path cannot be inspected.
    #[error("failed to inspect {path}: {message}")]
    Io {
        /// Path being inspected.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// Raised when `scp` exits unsuccessfully.
    #[error("{program} failed to copy {path} with status {status_text}: {stderr}")]
    Transfer {
        /// File being copied.
        path: Utf8PathBuf,
        /// Transfer program.
        program: String,
        /// Human readable exit status.
        status_text: String,
        /// Stderr captured from the transfer.
        stderr: String,
    },
    /// Raised when the transfer program cannot be started.
    #[error(transparent)]
    Runner(#[from] CommandError),
}

impl<R: CommandRunner> Transport<R> {
    /// Copies `files`, in order, into the remote home directory.
    ///
    /// Every file is checked locally before the first transfer starts. The
    /// first failed transfer aborts the rest.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::MissingFile`] before any network activity when a
    /// file is absent, or [`StageError::Transfer`] when `scp` fails.
    pub async fn stage(&self, files: &[Utf8PathBuf], endpoint: &Endpoint) -> Result<(), StageError> {
        for path in files {
            ensure_local_file(path)?;
        }

        let target = endpoint.remote_spec(REMOTE_HOME);
        for path in files {
            info!(file = %path, %endpoint, "copying file to instance");
            let args = self.scp_args(endpoint, path.as_str(), &target);
            let output = self.runner.run(&self.settings.scp_bin, &args).await?;
            if !output.is_success() {
                return Err(StageError::Transfer {
                    path: path.clone(),
                    program: self.settings.scp_bin.clone(),
                    status_text: output.status_text(),
                    stderr: output.stderr.trim().to_owned(),
                });
            }
            info!(file = %path, "copied file");
        }
        Ok(())
    }
}

fn ensure_local_file(path: &Utf8Path) -> Result<(), StageError> {
    let missing = || StageError::MissingFile {
        path: path.to_path_buf(),
    };
    match open_parent(path) {
        Ok((dir, name)) => {
            if dir.is_file(&name) {
                Ok(())
            } else {
                Err(missing())
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Err(missing()),
        Err(err) => Err(StageError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }),
    }
}
