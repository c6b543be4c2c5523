//! Configuration loading via `ortho-config`.
//!
//! [`VastbenchConfig`] holds the settings that rarely change between runs:
//! tool paths, ssh options, payload file names, and polling limits. Values
//! merge defaults, `vastbench.toml`, and `VASTBENCH_*` environment variables.
//! Per-run choices such as the GPU type live on the command line instead.

use std::ffi::OsString;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::readiness::ReadinessPoller;
use crate::transport::{ResultPaths, TransportSettings, payload_commands};

/// Upper bound for the poll interval and readiness timeout: one week.
pub const MAX_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Default container image booted on rented instances.
pub const DEFAULT_IMAGE: &str = "vastai/base-image:cuda-12.8.1-auto";

/// Tool settings loaded via `ortho-config`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "VASTBENCH",
    discovery(
        app_name = "vastbench",
        env_var = "VASTBENCH_CONFIG_PATH",
        config_file_name = "vastbench.toml",
        dotfile_name = ".vastbench.toml",
        project_file_name = "vastbench.toml"
    )
)]
pub struct VastbenchConfig {
    /// Path to the `vastai` executable.
    #[ortho_config(default = "vastai".to_owned())]
    pub vastai_bin: String,
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Path to the `scp` executable.
    #[ortho_config(default = "scp".to_owned())]
    pub scp_bin: String,
    /// Container image passed to `create instance`.
    #[ortho_config(default = DEFAULT_IMAGE.to_owned())]
    pub image: String,
    /// Seconds between readiness checks.
    #[ortho_config(default = 5)]
    pub poll_interval_secs: u64,
    /// Seconds to wait for the instance to become ready.
    #[ortho_config(default = 1800)]
    pub ready_timeout_secs: u64,
    /// Whether to force batch mode for `ssh` and `scp`.
    #[ortho_config(default = true)]
    pub ssh_batch_mode: bool,
    /// Whether to enforce host key checking. Rented hosts are new every run.
    #[ortho_config(default = false)]
    pub ssh_strict_host_key_checking: bool,
    /// Known hosts file passed to the clients.
    #[ortho_config(default = "/dev/null".to_owned())]
    pub ssh_known_hosts_file: String,
    /// Private key for the instance. Supports `~/` expansion. When unset the
    /// clients fall back to their default keys.
    pub ssh_identity_file: Option<String>,
    /// Local patch file copied to the instance.
    #[ortho_config(default = "patch.diff".to_owned())]
    pub patch_file: String,
    /// Local setup script copied to and run on the instance.
    #[ortho_config(default = "setup_script.sh".to_owned())]
    pub setup_script: String,
    /// Remote file receiving the setup script output.
    #[ortho_config(default = "setup_output.log".to_owned())]
    pub remote_log_file: String,
    /// Remote results file written by the setup script.
    #[ortho_config(default = "~/llama.cpp/results.out.txt".to_owned())]
    pub remote_results_path: String,
    /// Local copy of the results file.
    #[ortho_config(default = "vastai_results.txt".to_owned())]
    pub local_results_path: String,
    /// Process-wide log file.
    #[ortho_config(default = "vastbench.log".to_owned())]
    pub log_file: String,
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a configuration field is empty or out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl VastbenchConfig {
    /// Loads configuration from defaults, configuration files, and
    /// environment variables. Command-line arguments are left to the binary's
    /// own parser.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("vastbench")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the field and its environment
    /// variable when a value is blank or a duration is zero or longer than
    /// [`MAX_DURATION_SECS`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            (&self.vastai_bin, "vastai_bin"),
            (&self.ssh_bin, "ssh_bin"),
            (&self.scp_bin, "scp_bin"),
            (&self.image, "image"),
            (&self.ssh_known_hosts_file, "ssh_known_hosts_file"),
            (&self.patch_file, "patch_file"),
            (&self.setup_script, "setup_script"),
            (&self.remote_log_file, "remote_log_file"),
            (&self.remote_results_path, "remote_results_path"),
            (&self.local_results_path, "local_results_path"),
            (&self.log_file, "log_file"),
        ];
        for (value, field) in required {
            require_value(value, field)?;
        }
        if let Some(identity) = &self.ssh_identity_file {
            require_value(identity, "ssh_identity_file")?;
        }
        require_duration(self.poll_interval_secs, "poll_interval_secs")?;
        require_duration(self.ready_timeout_secs, "ready_timeout_secs")?;
        Ok(())
    }

    /// Builds the `ssh`/`scp` settings.
    #[must_use]
    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            ssh_bin: self.ssh_bin.clone(),
            scp_bin: self.scp_bin.clone(),
            batch_mode: self.ssh_batch_mode,
            strict_host_key_checking: self.ssh_strict_host_key_checking,
            known_hosts_file: self.ssh_known_hosts_file.clone(),
            identity_file: self.ssh_identity_file.clone(),
        }
    }

    /// Builds the readiness poller.
    #[must_use]
    pub const fn poller(&self) -> ReadinessPoller {
        ReadinessPoller::new(
            Duration::from_secs(self.poll_interval_secs),
            Duration::from_secs(self.ready_timeout_secs),
        )
    }

    /// Local files staged before the payload runs, in upload order.
    #[must_use]
    pub fn payload_files(&self) -> Vec<Utf8PathBuf> {
        vec![
            Utf8PathBuf::from(&self.patch_file),
            Utf8PathBuf::from(&self.setup_script),
        ]
    }

    /// Remote commands that run the setup script.
    #[must_use]
    pub fn payload_commands(&self) -> Vec<String> {
        payload_commands(&self.setup_script, &self.remote_log_file)
    }

    /// Results file locations.
    #[must_use]
    pub fn result_paths(&self) -> ResultPaths {
        ResultPaths {
            remote: self.remote_results_path.clone(),
            local: Utf8PathBuf::from(&self.local_results_path),
        }
    }
}

fn env_var_for(field: &str) -> String {
    format!("VASTBENCH_{}", field.to_ascii_uppercase())
}

fn require_value(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!(
            "{field} must not be empty: set {} or add {field} to vastbench.toml",
            env_var_for(field)
        )));
    }
    Ok(())
}

fn require_duration(value: u64, field: &str) -> Result<(), ConfigError> {
    let problem = if value == 0 {
        String::from("must be greater than zero")
    } else if value > MAX_DURATION_SECS {
        format!("must not exceed {MAX_DURATION_SECS} seconds")
    } else {
        return Ok(());
    };
    Err(ConfigError::Invalid(format!(
        "{field} {problem}: set {} or add {field} to vastbench.toml",
        env_var_for(field)
    )))
}
