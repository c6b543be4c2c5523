//! Errors surfaced by the benchmark lifecycle.

use thiserror::Error;

use crate::endpoint::EndpointError;
use crate::offer::OfferError;
use crate::readiness::ReadinessError;
use crate::transport::{ExecError, StageError};

/// Errors that abort a benchmark run.
///
/// Result retrieval is absent on purpose: a missing results file degrades the
/// run instead of failing it.
#[derive(Debug, Error)]
pub enum LifecycleError<MarketError>
where
    MarketError: std::error::Error + 'static,
{
    /// Raised when the offer search fails.
    #[error("offer search failed: {0}")]
    Search(#[source] MarketError),
    /// Raised when no offer satisfies the constraints.
    #[error(transparent)]
    NoEligibleOffer(#[from] OfferError),
    /// Raised when accepting the offer fails.
    #[error("failed to create instance: {0}")]
    Provision(#[source] MarketError),
    /// Raised when the instance fails or never becomes ready.
    #[error(transparent)]
    Readiness(#[from] ReadinessError),
    /// Raised when a connection string cannot be obtained.
    #[error("failed to fetch connection details: {0}")]
    Connection(#[source] MarketError),
    /// Raised when a connection string cannot be resolved.
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    /// Raised when payload files cannot be staged.
    #[error("staging failed: {0}")]
    Stage(#[from] StageError),
    /// Raised when a remote command fails.
    #[error("remote execution failed: {0}")]
    Remote(#[from] ExecError),
    /// Raised when an external interrupt stops the run.
    #[error("run interrupted")]
    Interrupted,
}
