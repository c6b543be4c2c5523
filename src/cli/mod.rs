//! Command-line interface definitions for the `vastbench` binary.
//!
//! This module centralises the clap parser so both the main binary and the
//! build script can reuse it when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `vastbench` binary.
#[derive(Debug, Parser)]
#[command(
    name = "vastbench",
    version,
    about = "Rent a Vast.ai GPU instance, run a benchmark payload on it, and fetch the results"
)]
pub(crate) struct Cli {
    /// GPU model to rent, as named by the marketplace.
    #[arg(long, value_name = "GPU", default_value = "RTX_4090")]
    pub(crate) gpu_type: String,
    /// Preferred region. Advisory only; offers are not filtered by it.
    #[arg(long, value_name = "REGION", default_value = "Asia")]
    pub(crate) region: String,
    /// Minimum disk in GB. Also the disk requested for the instance.
    #[arg(long, value_name = "GB", default_value_t = 32.0, value_parser = parse_disk_size)]
    pub(crate) disk_size: f64,
    /// Number of GPUs per instance.
    #[arg(
        long,
        value_name = "COUNT",
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub(crate) num_gpus: u32,
    /// Use an existing instance instead of renting a new one.
    #[arg(long, value_name = "ID")]
    pub(crate) instance_id: Option<String>,
    /// Leave the instance running when the run ends.
    #[arg(long)]
    pub(crate) no_cleanup: bool,
}

fn parse_disk_size(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|err| format!("invalid disk size '{raw}': {err}"))?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("disk size must be a positive number of GB, got '{raw}'"))
    }
}
