//! Orchestrates one benchmark run on a rented instance.
//!
//! The workflow provisions (or attaches to) an instance, waits for it to
//! become ready, resolves its endpoints, stages the payload, runs it, and
//! retrieves the results. Whatever happens, including an external interrupt,
//! the run then passes through teardown exactly once.

use std::future::Future;
use std::time::Duration;

use camino::Utf8PathBuf;
use tracing::{error, info, warn};

use crate::command::CommandRunner;
use crate::endpoint::{Endpoint, Scheme};
use crate::marketplace::{InstanceId, LaunchRequest, Marketplace, OfferQuery};
use crate::offer::{Offer, OfferError, select_offer};
use crate::readiness::{Readiness, ReadinessPoller};
use crate::transport::{ResultPaths, ResultsOutcome, Transport};

mod context;
mod error;

pub use context::{RunContext, Teardown};
pub use error::LifecycleError;

/// How the run obtains its instance.
#[derive(Clone, Debug, PartialEq)]
pub enum Provisioning {
    /// Rent the cheapest eligible offer.
    Launch {
        /// Offer search filter.
        query: OfferQuery,
        /// Minimum disk, also used as the disk request.
        min_disk_gb: f64,
        /// Container image to boot.
        image: String,
    },
    /// Reuse an instance that already exists.
    Attach(InstanceId),
}

/// How long teardown waits for the marketplace to accept a termination.
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(120);

/// Everything a run needs to know up front.
#[derive(Clone, Debug, PartialEq)]
pub struct RunPlan {
    /// Instance source.
    pub provisioning: Provisioning,
    /// Local files copied to the remote home directory.
    pub payload_files: Vec<Utf8PathBuf>,
    /// Remote commands run in order after staging.
    pub commands: Vec<String>,
    /// Results file locations.
    pub results: ResultPaths,
    /// Whether to terminate the instance when the run ends.
    pub cleanup: bool,
}

/// Summary of a completed run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    /// Instance the benchmark ran on.
    pub instance_id: InstanceId,
    /// Offer that was rented; `None` when attaching.
    pub offer: Option<Offer>,
    /// Readiness observation.
    pub readiness: Readiness,
    /// Retrieved results, possibly degraded.
    pub results: ResultsOutcome,
}

/// Sequences the benchmark workflow against a marketplace and a transport.
#[derive(Debug)]
pub struct BenchmarkOrchestrator<M, R: CommandRunner> {
    market: M,
    transport: Transport<R>,
    poller: ReadinessPoller,
    terminate_timeout: Duration,
}

impl<M, R> BenchmarkOrchestrator<M, R>
where
    M: Marketplace,
    R: CommandRunner,
{
    /// Creates a new orchestrator.
    #[must_use]
    pub const fn new(market: M, transport: Transport<R>, poller: ReadinessPoller) -> Self {
        Self {
            market,
            transport,
            poller,
            terminate_timeout: DEFAULT_TERMINATE_TIMEOUT,
        }
    }

    /// Overrides how long teardown waits for termination.
    #[must_use]
    pub const fn with_terminate_timeout(mut self, timeout: Duration) -> Self {
        self.terminate_timeout = timeout;
        self
    }

    /// Borrows the marketplace.
    #[must_use]
    pub const fn market(&self) -> &M {
        &self.market
    }

    /// Runs `plan` until it completes, fails, or `interrupt` resolves.
    ///
    /// Teardown runs afterwards in every case and records its outcome in
    /// `context.teardown`. A failed termination is logged and never replaces
    /// the run's own outcome.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] for the first workflow step that fails, or
    /// [`LifecycleError::Interrupted`] when `interrupt` resolves first.
    pub async fn run<F>(
        &self,
        plan: &RunPlan,
        context: &mut RunContext,
        interrupt: F,
    ) -> Result<RunReport, LifecycleError<M::Error>>
    where
        F: Future<Output = ()>,
    {
        let outcome = tokio::select! {
            result = self.execute(plan, &mut *context) => result,
            () = interrupt => {
                warn!("interrupt received; cleaning up");
                Err(LifecycleError::Interrupted)
            }
        };

        if let Err(err) = &outcome {
            error!(error = %err, "benchmark run failed");
        }
        self.teardown(plan, context).await;
        outcome
    }

    async fn execute(
        &self,
        plan: &RunPlan,
        context: &mut RunContext,
    ) -> Result<RunReport, LifecycleError<M::Error>> {
        let (instance_id, offer) = self.acquire(&plan.provisioning, context).await?;
        let readiness = self.poller.wait(&self.market, &instance_id).await?;

        let ssh = self.resolve(&instance_id, Scheme::Ssh).await?;
        let scp = self.resolve(&instance_id, Scheme::Scp).await?;
        context.ssh = Some(ssh.clone());
        context.scp = Some(scp.clone());

        self.transport.stage(&plan.payload_files, &scp).await?;
        self.transport.execute(&ssh, &plan.commands).await?;
        let results = self.transport.retrieve(&scp, &ssh, &plan.results).await;

        info!(instance_id = %instance_id, "benchmark run completed");
        Ok(RunReport {
            instance_id,
            offer,
            readiness,
            results,
        })
    }

    /// Obtains the instance and records it in `context` before returning.
    async fn acquire(
        &self,
        provisioning: &Provisioning,
        context: &mut RunContext,
    ) -> Result<(InstanceId, Option<Offer>), LifecycleError<M::Error>> {
        match provisioning {
            Provisioning::Attach(instance_id) => {
                info!(instance_id = %instance_id, "using existing instance");
                context.instance = Some(instance_id.clone());
                Ok((instance_id.clone(), None))
            }
            Provisioning::Launch {
                query,
                min_disk_gb,
                image,
            } => {
                info!(gpu_type = %query.gpu_type, num_gpus = query.num_gpus, "searching offers");
                let offers = self
                    .market
                    .search(query)
                    .await
                    .map_err(LifecycleError::Search)?;
                let offer = select_offer(&offers, *min_disk_gb)?;
                let offer_id = offer
                    .offer_id
                    .clone()
                    .ok_or(OfferError::NoEligibleOffer {
                        considered: offers.len(),
                        min_disk_gb: *min_disk_gb,
                    })?;
                info!(
                    offer_id = %offer_id,
                    price = ?offer.price,
                    geolocation = offer.geolocation.as_deref().unwrap_or("unknown"),
                    "selected offer"
                );

                let request = LaunchRequest {
                    offer_id,
                    disk_gb: *min_disk_gb,
                    image: image.clone(),
                };
                let instance_id = self
                    .market
                    .create(&request)
                    .await
                    .map_err(LifecycleError::Provision)?;
                info!(instance_id = %instance_id, "instance created");
                context.instance = Some(instance_id.clone());
                Ok((instance_id, Some(offer)))
            }
        }
    }

    async fn resolve(
        &self,
        instance_id: &InstanceId,
        scheme: Scheme,
    ) -> Result<Endpoint, LifecycleError<M::Error>> {
        let uri = self
            .market
            .connection_uri(instance_id, scheme)
            .await
            .map_err(LifecycleError::Connection)?;
        let endpoint = Endpoint::parse(&uri, scheme)?;
        info!(%endpoint, "resolved endpoint");
        Ok(endpoint)
    }

    async fn teardown(&self, plan: &RunPlan, context: &mut RunContext) {
        let Some(instance_id) = context.instance.take() else {
            context.teardown = Teardown::NotNeeded;
            return;
        };

        if !plan.cleanup {
            warn!(instance_id = %instance_id, "cleanup disabled; instance left running");
            context.teardown = Teardown::Skipped(instance_id);
            return;
        }

        info!(instance_id = %instance_id, "terminating instance");
        let attempt = tokio::time::timeout(
            self.terminate_timeout,
            self.market.terminate(&instance_id),
        )
        .await;
        context.teardown = match attempt {
            Ok(Ok(())) => {
                info!(instance_id = %instance_id, "instance terminated");
                Teardown::Terminated(instance_id)
            }
            Ok(Err(err)) => termination_failed(instance_id, err.to_string()),
            Err(_) => termination_failed(
                instance_id,
                format!(
                    "termination did not finish within {:?}",
                    self.terminate_timeout
                ),
            ),
        };
    }
}

fn termination_failed(instance_id: InstanceId, message: String) -> Teardown {
    error!(
        instance_id = %instance_id,
        error = %message,
        "failed to terminate instance; destroy it manually"
    );
    Teardown::Failed {
        instance_id,
        message,
    }
}
