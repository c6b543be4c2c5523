//! Readiness polling for freshly provisioned instances.
//!
//! Polling is the only retry loop in the workflow. It is bounded by wall-clock
//! time rather than attempt count: the marketplace is asked for the instance
//! status at a fixed interval until the instance is ready, reports a failed
//! state, or the deadline passes. The deadline also bounds each status query,
//! so a query that never answers cannot hold the poller past its timeout.

use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{info, warn};

use crate::marketplace::{InstanceId, InstanceStatus, Marketplace};

/// Default delay between status queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default overall readiness deadline.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(1800);

/// Deadline used when the configured timeout cannot be represented.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// States of the readiness state machine.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PollState {
    /// Waiting for a terminal observation.
    Pending,
    /// The instance reported a ready state.
    Ready(String),
    /// The instance reported a failed state.
    Failed(String),
    /// The deadline passed before a terminal observation.
    TimedOut,
}

impl PollState {
    /// Applies one status observation. Terminal states never change.
    #[must_use]
    pub fn observe(self, status: &InstanceStatus) -> Self {
        match (self, status) {
            (Self::Pending, InstanceStatus::Ready(raw)) => Self::Ready(raw.clone()),
            (Self::Pending, InstanceStatus::Failed(raw)) => Self::Failed(raw.clone()),
            (Self::Pending, InstanceStatus::Pending(_) | InstanceStatus::Unlisted) => Self::Pending,
            (terminal, _) => terminal,
        }
    }

    /// Applies deadline expiry. Only a pending poll can time out.
    #[must_use]
    pub fn expire(self) -> Self {
        match self {
            Self::Pending => Self::TimedOut,
            terminal => terminal,
        }
    }

    /// Returns `true` once no further observation can change the state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Successful readiness outcome.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Readiness {
    /// Raw status string that signalled readiness.
    pub status: String,
    /// Number of status queries issued, including the final one.
    pub attempts: u32,
}

/// Errors raised while waiting for readiness.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ReadinessError {
    /// Raised when the marketplace reports a failed state.
    #[error("instance {instance_id} failed with status: {status}")]
    InstanceFailed {
        /// Instance being polled.
        instance_id: String,
        /// Raw status string reported by the marketplace.
        status: String,
        /// Number of status queries issued.
        attempts: u32,
    },
    /// Raised when the instance does not become ready before the deadline.
    #[error("instance {instance_id} did not become ready within {timeout_secs} seconds")]
    Timeout {
        /// Instance being polled.
        instance_id: String,
        /// Configured deadline in seconds.
        timeout_secs: u64,
        /// Number of status queries issued.
        attempts: u32,
    },
}

/// Polls instance status until it is ready, failed, or out of time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReadinessPoller {
    interval: Duration,
    timeout: Duration,
}

impl Default for ReadinessPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_READY_TIMEOUT)
    }
}

impl ReadinessPoller {
    /// Creates a poller with a fixed interval and an overall deadline.
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Delay between status queries.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Overall deadline.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Waits for `instance` to become ready.
    ///
    /// A status query that errors is logged and counted as still pending, so
    /// a flaky marketplace response does not abort the run. An instance that
    /// is not yet in the listing is also treated as pending.
    ///
    /// # Errors
    ///
    /// Returns [`ReadinessError::InstanceFailed`] the first time a failed
    /// state is observed, or [`ReadinessError::Timeout`] when the deadline
    /// passes first.
    pub async fn wait<M: Marketplace>(
        &self,
        market: &M,
        instance: &InstanceId,
    ) -> Result<Readiness, ReadinessError> {
        info!(instance_id = %instance, timeout_secs = self.timeout.as_secs(), "waiting for instance to become ready");
        let deadline = deadline_after(Instant::now(), self.timeout);
        let mut state = PollState::Pending;
        let mut attempts: u32 = 0;

        while Instant::now() <= deadline {
            attempts += 1;
            match timeout_at(deadline, market.status(instance)).await {
                Ok(Ok(status)) => {
                    log_observation(instance, &status);
                    state = state.observe(&status);
                }
                Ok(Err(err)) => {
                    warn!(instance_id = %instance, attempt = attempts, error = %err, "status check failed; will retry");
                }
                Err(_) => {
                    warn!(instance_id = %instance, attempt = attempts, "status check still running at the deadline");
                    break;
                }
            }

            if state.is_terminal() || timeout_at(deadline, sleep(self.interval)).await.is_err() {
                break;
            }
        }

        match state.expire() {
            PollState::Ready(status) => {
                info!(instance_id = %instance, attempts, "instance is ready");
                Ok(Readiness { status, attempts })
            }
            PollState::Failed(status) => Err(ReadinessError::InstanceFailed {
                instance_id: instance.to_string(),
                status,
                attempts,
            }),
            PollState::Pending | PollState::TimedOut => Err(ReadinessError::Timeout {
                instance_id: instance.to_string(),
                timeout_secs: self.timeout.as_secs(),
                attempts,
            }),
        }
    }
}

/// Adds `timeout` to `start`, saturating to a distant deadline on overflow.
fn deadline_after(start: Instant, timeout: Duration) -> Instant {
    start
        .checked_add(timeout)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}

fn log_observation(instance: &InstanceId, status: &InstanceStatus) {
    match status {
        InstanceStatus::Unlisted => {
            warn!(instance_id = %instance, "instance not found in instances list");
        }
        InstanceStatus::Pending(raw) | InstanceStatus::Ready(raw) | InstanceStatus::Failed(raw) => {
            info!(instance_id = %instance, status = %raw, "instance status");
        }
    }
}
