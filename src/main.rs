//! Binary entry point for the `vastbench` CLI.

use std::io::{self, Write};
use std::process;

use camino::Utf8Path;
use clap::Parser;
use thiserror::Error;
use tracing::{info, warn};

use vastbench::config::{ConfigError, VastbenchConfig};
use vastbench::lifecycle::{
    BenchmarkOrchestrator, LifecycleError, Provisioning, RunContext, RunPlan,
};
use vastbench::logging::{LoggingError, init_logging};
use vastbench::marketplace::{InstanceId, MarketplaceError, OfferQuery, VastMarketplace};
use vastbench::signal::shutdown_signal;
use vastbench::transport::{ResultsOutcome, Transport};

mod cli;

use cli::Cli;

const BANNER_RULE: &str = "==================================================";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),
    #[error("benchmark failed: {0}")]
    Run(#[from] LifecycleError<MarketplaceError>),
    #[error("failed to write results: {0}")]
    Output(String),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let exit_code = match run(&cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn run(cli: &Cli) -> Result<(), CliError> {
    let config = VastbenchConfig::load_without_cli_args()?;
    config.validate()?;
    init_logging(Utf8Path::new(&config.log_file))?;

    let plan = build_plan(cli, &config);
    let orchestrator = BenchmarkOrchestrator::new(
        VastMarketplace::with_process_runner(config.vastai_bin.clone()),
        Transport::with_process_runner(config.transport_settings()),
        config.poller(),
    );

    let mut context = RunContext::new();
    let outcome = orchestrator
        .run(&plan, &mut context, shutdown_signal())
        .await;
    if let Some(instance_id) = context.teardown.leaked_instance() {
        warn!(instance_id = %instance_id, "instance is still running");
    }

    let report = outcome?;
    match &report.results {
        ResultsOutcome::Unavailable { .. } => {
            warn!("benchmark finished but results could not be retrieved");
        }
        ResultsOutcome::Downloaded { path, text } => {
            info!(path = %path, "results saved");
            print_results(io::stdout(), text)?;
        }
        ResultsOutcome::Streamed { text } => print_results(io::stdout(), text)?,
    }
    Ok(())
}

fn build_plan(cli: &Cli, config: &VastbenchConfig) -> RunPlan {
    let provisioning = cli
        .instance_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map_or_else(
            || Provisioning::Launch {
                query: OfferQuery {
                    gpu_type: cli.gpu_type.clone(),
                    num_gpus: cli.num_gpus,
                    region: Some(cli.region.clone()),
                },
                min_disk_gb: cli.disk_size,
                image: config.image.clone(),
            },
            |id| Provisioning::Attach(InstanceId::new(id)),
        );

    RunPlan {
        provisioning,
        payload_files: config.payload_files(),
        commands: config.payload_commands(),
        results: config.result_paths(),
        cleanup: !cli.no_cleanup,
    }
}

fn print_results(mut target: impl Write, text: &str) -> Result<(), CliError> {
    writeln!(target, "\n{BANNER_RULE}\nBENCHMARK RESULTS\n{BANNER_RULE}")
        .and_then(|()| writeln!(target, "{}", text.trim_end()))
        .and_then(|()| writeln!(target, "{BANNER_RULE}"))
        .map_err(|err| CliError::Output(err.to_string()))
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
mod main_tests;
