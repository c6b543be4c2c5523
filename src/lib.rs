//! Core library for the `vastbench` GPU benchmark runner.
//!
//! The crate rents a GPU instance on the Vast.ai marketplace, waits for it to
//! boot, stages a benchmark payload over `scp`, runs it over `ssh`, and brings
//! the results back. The [`lifecycle`] module sequences those steps and
//! guarantees the instance is released on every exit path.

pub mod command;
pub mod config;
pub mod endpoint;
pub mod lifecycle;
pub mod logging;
pub mod marketplace;
pub mod offer;
pub mod readiness;
pub mod signal;
pub mod test_support;
pub mod transport;

pub use command::{
    CommandError, CommandOutput, CommandRunner, ProcessCommandRunner, StreamingCommandRunner,
};
pub use config::{ConfigError, VastbenchConfig};
pub use endpoint::{Endpoint, EndpointError, Scheme};
pub use lifecycle::{
    BenchmarkOrchestrator, DEFAULT_TERMINATE_TIMEOUT, LifecycleError, Provisioning, RunContext,
    RunPlan, RunReport, Teardown,
};
pub use marketplace::{InstanceId, InstanceStatus, Marketplace, MarketplaceError, VastMarketplace};
pub use offer::{Offer, OfferError, select_offer};
pub use readiness::{Readiness, ReadinessError, ReadinessPoller};
pub use transport::{ResultPaths, ResultsOutcome, Transport, TransportSettings};
