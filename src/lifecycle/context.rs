//! Per-run state owned by the orchestrator.

use crate::endpoint::Endpoint;
use crate::marketplace::InstanceId;

/// State accumulated while a run progresses.
///
/// One context belongs to exactly one run. The instance identifier is
/// recorded the moment it is known so teardown can find it from any exit
/// path, and teardown takes it out so it can only be released once.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunContext {
    /// Instance owned by the run, until teardown takes it.
    pub instance: Option<InstanceId>,
    /// Resolved shell endpoint.
    pub ssh: Option<Endpoint>,
    /// Resolved file transfer endpoint.
    pub scp: Option<Endpoint>,
    /// What teardown did.
    pub teardown: Teardown,
}

impl RunContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Outcome of the teardown phase.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum Teardown {
    /// Teardown has not run yet.
    #[default]
    Pending,
    /// No instance was ever obtained.
    NotNeeded,
    /// Cleanup was disabled; the instance was left running.
    Skipped(InstanceId),
    /// Termination was accepted.
    Terminated(InstanceId),
    /// Termination was attempted and failed.
    Failed {
        /// Instance that may still be running.
        instance_id: InstanceId,
        /// Marketplace error text.
        message: String,
    },
}

impl Teardown {
    /// Returns the instance left running, if any.
    #[must_use]
    pub const fn leaked_instance(&self) -> Option<&InstanceId> {
        match self {
            Self::Skipped(instance_id) | Self::Failed { instance_id, .. } => Some(instance_id),
            Self::Pending | Self::NotNeeded | Self::Terminated(_) => None,
        }
    }
}
