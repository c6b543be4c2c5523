//! Marketplace abstraction for renting, inspecting, and releasing instances.
//!
//! The lifecycle only talks to the marketplace through [`Marketplace`]. The
//! production implementation, [`VastMarketplace`], drives the `vastai` CLI
//! through a [`crate::command::CommandRunner`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::endpoint::Scheme;
use crate::offer::Offer;

mod error;
mod parse;
mod vast;

pub use error::MarketplaceError;
pub use parse::{classify_status, parse_instance_id, parse_offers, parse_status};
pub use vast::{DEFAULT_VASTAI_BIN, VastMarketplace};

/// Canonical instance identifier, always held as a trimmed string.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct InstanceId(String);

impl InstanceId {
    /// Wraps an identifier, trimming surrounding whitespace.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_owned())
    }

    /// Borrows the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Instance state as reported by the marketplace, classified for polling.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InstanceStatus {
    /// Still transitioning; carries the raw marketplace state.
    Pending(String),
    /// Accepting connections.
    Ready(String),
    /// Terminal failure state.
    Failed(String),
    /// The instance is not in the listing yet.
    Unlisted,
}

/// Filter parameters for an offer search.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OfferQuery {
    /// GPU model name, for example `RTX_4090`.
    pub gpu_type: String,
    /// Number of GPUs per instance.
    pub num_gpus: u32,
    /// Preferred region. Advisory only; it is logged but never filtered on.
    pub region: Option<String>,
}

/// Parameters for accepting an offer.
#[derive(Clone, Debug, PartialEq)]
pub struct LaunchRequest {
    /// Offer identifier to accept.
    pub offer_id: String,
    /// Disk to allocate, in gigabytes.
    pub disk_gb: f64,
    /// Container image to boot.
    pub image: String,
}

/// Future returned by marketplace operations.
pub type MarketFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Operations the lifecycle needs from a compute marketplace.
pub trait Marketplace: Send + Sync {
    /// Marketplace specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Lists offers matching `query`.
    fn search<'a>(&'a self, query: &'a OfferQuery) -> MarketFuture<'a, Vec<Offer>, Self::Error>;

    /// Accepts an offer and returns the new instance identifier.
    fn create<'a>(
        &'a self,
        request: &'a LaunchRequest,
    ) -> MarketFuture<'a, InstanceId, Self::Error>;

    /// Reports the classified status of `instance`.
    fn status<'a>(
        &'a self,
        instance: &'a InstanceId,
    ) -> MarketFuture<'a, InstanceStatus, Self::Error>;

    /// Returns the raw connection string for `instance` over `scheme`.
    fn connection_uri<'a>(
        &'a self,
        instance: &'a InstanceId,
        scheme: Scheme,
    ) -> MarketFuture<'a, String, Self::Error>;

    /// Releases `instance`.
    fn terminate<'a>(&'a self, instance: &'a InstanceId) -> MarketFuture<'a, (), Self::Error>;
}
