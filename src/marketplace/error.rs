//! Error types for the marketplace client.

use thiserror::Error;

use crate::command::CommandError;
use crate::endpoint::Scheme;

/// Errors raised by the `vastai` marketplace client.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum MarketplaceError {
    /// Raised when the CLI cannot be started.
    #[error(transparent)]
    Runner(#[from] CommandError),
    /// Raised when the CLI exits with a non-zero status.
    #[error("{program} {action} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// CLI binary that failed.
        program: String,
        /// Marketplace action being performed.
        action: String,
        /// Human readable exit status.
        status_text: String,
        /// Stderr captured from the CLI.
        stderr: String,
    },
    /// Raised when offer search output is not structured data.
    #[error("failed to parse offer search output: {message}")]
    Query {
        /// Parser error message.
        message: String,
        /// Raw output that failed to parse.
        raw: String,
    },
    /// Raised when accepting an offer does not yield an instance identifier.
    #[error("failed to provision instance: {message}")]
    Provisioning {
        /// Description of the failure.
        message: String,
        /// Raw output returned by the marketplace.
        raw: String,
    },
    /// Raised when the instance listing is not structured data.
    #[error("failed to parse instance listing: {message}")]
    Status {
        /// Parser error message.
        message: String,
        /// Raw output that failed to parse.
        raw: String,
    },
    /// Raised when the marketplace returns an empty connection string.
    #[error("marketplace returned no {scheme} connection string for instance {instance_id}")]
    EmptyConnectionUri {
        /// Instance the connection string was requested for.
        instance_id: String,
        /// Requested transport.
        scheme: Scheme,
    },
}
