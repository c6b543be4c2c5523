//! `vastai` CLI implementation of [`Marketplace`].

use std::ffi::OsString;

use tracing::{info, warn};

use crate::command::{CommandOutput, CommandRunner, ProcessCommandRunner};
use crate::endpoint::Scheme;
use crate::offer::Offer;

use super::{
    InstanceId, InstanceStatus, LaunchRequest, MarketFuture, Marketplace, MarketplaceError,
    OfferQuery, parse_instance_id, parse_offers, parse_status,
};

/// Default Vast.ai CLI binary name.
pub const DEFAULT_VASTAI_BIN: &str = "vastai";

/// Marketplace client that shells out to the `vastai` CLI.
#[derive(Clone, Debug)]
pub struct VastMarketplace<R: CommandRunner> {
    vastai_bin: String,
    runner: R,
}

impl VastMarketplace<ProcessCommandRunner> {
    /// Creates a client wired to the real process runner.
    #[must_use]
    pub fn with_process_runner(vastai_bin: impl Into<String>) -> Self {
        Self::new(vastai_bin, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> VastMarketplace<R> {
    /// Creates a client using the provided runner.
    #[must_use]
    pub fn new(vastai_bin: impl Into<String>, runner: R) -> Self {
        Self {
            vastai_bin: vastai_bin.into(),
            runner,
        }
    }

    async fn run_vastai(
        &self,
        args: &[OsString],
        action: &str,
    ) -> Result<CommandOutput, MarketplaceError> {
        let output = self.runner.run(&self.vastai_bin, args).await?;
        if output.is_success() {
            return Ok(output);
        }

        Err(MarketplaceError::CommandFailure {
            program: self.vastai_bin.clone(),
            action: action.to_owned(),
            status_text: output.status_text(),
            stderr: output.stderr.trim().to_owned(),
        })
    }

    async fn search_offers(&self, query: &OfferQuery) -> Result<Vec<Offer>, MarketplaceError> {
        if let Some(region) = &query.region {
            info!(region, "region preference is advisory and not used as a filter");
        }
        info!(gpu_type = %query.gpu_type, num_gpus = query.num_gpus, "searching offers");
        let args = vec![
            OsString::from("search"),
            OsString::from("offers"),
            OsString::from(format!(
                "gpu_name={} num_gpus={}",
                query.gpu_type, query.num_gpus
            )),
            OsString::from("--raw"),
        ];
        let output = self.run_vastai(&args, "search offers").await?;
        let offers = parse_offers(&output.stdout).inspect_err(|err| {
            warn!(error = %err, raw = %output.stdout, "offer search output is unusable");
        })?;
        info!(count = offers.len(), "offers found");
        Ok(offers)
    }

    async fn create_instance(
        &self,
        request: &LaunchRequest,
    ) -> Result<InstanceId, MarketplaceError> {
        info!(offer_id = %request.offer_id, image = %request.image, disk_gb = request.disk_gb, "accepting offer");
        let args = vec![
            OsString::from("create"),
            OsString::from("instance"),
            OsString::from(&request.offer_id),
            OsString::from("--image"),
            OsString::from(&request.image),
            OsString::from("--disk"),
            OsString::from(request.disk_gb.to_string()),
            OsString::from("--raw"),
        ];
        let output = self
            .run_vastai(&args, "create instance")
            .await
            .map_err(|err| match err {
                MarketplaceError::CommandFailure {
                    status_text,
                    stderr,
                    ..
                } => MarketplaceError::Provisioning {
                    message: format!("create exited with status {status_text}"),
                    raw: stderr,
                },
                other => other,
            })?;
        let instance = parse_instance_id(&output.stdout)?;
        info!(instance_id = %instance, "instance launched");
        Ok(instance)
    }

    async fn instance_status(
        &self,
        instance: &InstanceId,
    ) -> Result<InstanceStatus, MarketplaceError> {
        let args = vec![
            OsString::from("show"),
            OsString::from("instances"),
            OsString::from("--raw"),
        ];
        let output = self.run_vastai(&args, "show instances").await?;
        parse_status(&output.stdout, instance)
    }

    async fn fetch_connection_uri(
        &self,
        instance: &InstanceId,
        scheme: Scheme,
    ) -> Result<String, MarketplaceError> {
        let subcommand = match scheme {
            Scheme::Ssh => "ssh-url",
            Scheme::Scp => "scp-url",
        };
        let args = vec![
            OsString::from(subcommand),
            OsString::from(instance.as_str()),
        ];
        let output = self.run_vastai(&args, subcommand).await?;
        let uri = output.stdout.trim();
        if uri.is_empty() {
            return Err(MarketplaceError::EmptyConnectionUri {
                instance_id: instance.to_string(),
                scheme,
            });
        }
        info!(instance_id = %instance, %scheme, uri, "connection string resolved");
        Ok(uri.to_owned())
    }

    async fn destroy_instance(&self, instance: &InstanceId) -> Result<(), MarketplaceError> {
        info!(instance_id = %instance, "destroying instance");
        let args = vec![
            OsString::from("destroy"),
            OsString::from("instance"),
            OsString::from(instance.as_str()),
        ];
        self.run_vastai(&args, "destroy instance").await?;
        Ok(())
    }
}

impl<R: CommandRunner> Marketplace for VastMarketplace<R> {
    type Error = MarketplaceError;

    fn search<'a>(&'a self, query: &'a OfferQuery) -> MarketFuture<'a, Vec<Offer>, Self::Error> {
        Box::pin(self.search_offers(query))
    }

    fn create<'a>(
        &'a self,
        request: &'a LaunchRequest,
    ) -> MarketFuture<'a, InstanceId, Self::Error> {
        Box::pin(self.create_instance(request))
    }

    fn status<'a>(
        &'a self,
        instance: &'a InstanceId,
    ) -> MarketFuture<'a, InstanceStatus, Self::Error> {
        Box::pin(self.instance_status(instance))
    }

    fn connection_uri<'a>(
        &'a self,
        instance: &'a InstanceId,
        scheme: Scheme,
    ) -> MarketFuture<'a, String, Self::Error> {
        Box::pin(self.fetch_connection_uri(instance, scheme))
    }

    fn terminate<'a>(&'a self, instance: &'a InstanceId) -> MarketFuture<'a, (), Self::Error> {
        Box::pin(self.destroy_instance(instance))
    }
}
