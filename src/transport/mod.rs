//! File staging, remote execution, and result retrieval over `scp`/`ssh`.
//!
//! [`Transport`] wraps the system `ssh` and `scp` clients. Every call takes a
//! resolved [`Endpoint`], so connection details are never cached here. Host
//! key checking is disabled by default because each rented instance is new
//! and has no prior trust record.

use std::ffi::OsString;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};

use crate::command::{CommandRunner, ProcessCommandRunner};
use crate::endpoint::Endpoint;

mod exec;
mod retrieve;
mod stage;

pub use exec::{ExecError, payload_commands};
pub use retrieve::{ResultPaths, ResultsOutcome, RetrievalError};
pub use stage::StageError;

/// `ssh`/`scp` settings shared by all transfers and remote commands.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransportSettings {
    /// Path to the `ssh` executable.
    pub ssh_bin: String,
    /// Path to the `scp` executable.
    pub scp_bin: String,
    /// Whether to force batch mode to avoid password prompts.
    pub batch_mode: bool,
    /// Whether to enforce host key checking.
    pub strict_host_key_checking: bool,
    /// Known hosts file passed to the clients.
    pub known_hosts_file: String,
    /// Optional private key; a leading `~/` is expanded locally.
    pub identity_file: Option<String>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            ssh_bin: String::from("ssh"),
            scp_bin: String::from("scp"),
            batch_mode: true,
            strict_host_key_checking: false,
            known_hosts_file: String::from("/dev/null"),
            identity_file: None,
        }
    }
}

/// Runs transfers and remote commands through a [`CommandRunner`].
#[derive(Clone, Debug)]
pub struct Transport<R: CommandRunner> {
    settings: TransportSettings,
    runner: R,
}

impl Transport<ProcessCommandRunner> {
    /// Convenience constructor that wires the real process runner.
    #[must_use]
    pub const fn with_process_runner(settings: TransportSettings) -> Self {
        Self::new(settings, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> Transport<R> {
    /// Creates a transport using the provided runner.
    #[must_use]
    pub const fn new(settings: TransportSettings, runner: R) -> Self {
        Self { settings, runner }
    }

    /// Returns the active settings.
    #[must_use]
    pub const fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    fn client_options(&self) -> Vec<OsString> {
        let mut args = Vec::new();
        if self.settings.batch_mode {
            args.push(OsString::from("-o"));
            args.push(OsString::from("BatchMode=yes"));
        }
        let strict = if self.settings.strict_host_key_checking {
            "yes"
        } else {
            "no"
        };
        args.push(OsString::from("-o"));
        args.push(OsString::from(format!("StrictHostKeyChecking={strict}")));
        args.push(OsString::from("-o"));
        args.push(OsString::from(format!(
            "UserKnownHostsFile={}",
            self.settings.known_hosts_file
        )));
        if let Some(identity) = &self.settings.identity_file {
            args.push(OsString::from("-i"));
            args.push(OsString::from(expand_tilde(identity)));
        }
        args
    }

    /// Builds `scp` arguments copying `source` to `target`.
    fn scp_args(&self, endpoint: &Endpoint, source: &str, target: &str) -> Vec<OsString> {
        let mut args = vec![OsString::from("-P"), OsString::from(&endpoint.port)];
        args.extend(self.client_options());
        args.push(OsString::from(source));
        args.push(OsString::from(target));
        args
    }

    /// Builds `ssh` arguments running `remote_command` on `endpoint`.
    fn ssh_args(&self, endpoint: &Endpoint, remote_command: &str) -> Vec<OsString> {
        let mut args = vec![OsString::from("-p"), OsString::from(&endpoint.port)];
        args.extend(self.client_options());
        args.push(OsString::from(endpoint.destination()));
        args.push(OsString::from(remote_command));
        args
    }
}

/// Expands a leading `~/` prefix to the user's home directory.
///
/// When `HOME` is unset the input is returned unchanged.
#[must_use]
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return format!("{}/{rest}", home.to_string_lossy());
    }
    path.to_owned()
}

/// Splits a local path into the directory to open and the entry name inside
/// it. Bare file names resolve against the working directory.
fn split_local(path: &Utf8Path) -> Option<(&Utf8Path, &str)> {
    let name = path.file_name()?;
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    Some((parent, name))
}

pub(crate) fn open_parent(path: &Utf8Path) -> std::io::Result<(Dir, String)> {
    let (parent, name) = split_local(path).ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{path} does not name a file"),
        )
    })?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, name.to_owned()))
}
