//! Connection endpoint resolution.
//!
//! The marketplace hands out connection strings of the form
//! `<scheme>://<user>@<host>:<port>`. Resolution is pure string handling; it
//! never touches the network, so a malformed string is reported before any
//! transfer or remote command is attempted.

use std::fmt;

use thiserror::Error;

/// Transport a connection string is meant for.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Scheme {
    /// Interactive shell access (`ssh://`).
    Ssh,
    /// File transfer access (`scp://`).
    Scp,
}

impl Scheme {
    /// Prefix expected at the start of a connection string.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Ssh => "ssh://",
            Self::Scp => "scp://",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ssh => f.write_str("ssh"),
            Self::Scp => f.write_str("scp"),
        }
    }
}

/// Resolved `(user, host, port)` triple for one transport.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Endpoint {
    /// Transport the endpoint was resolved for.
    pub scheme: Scheme,
    /// Remote login user.
    pub user: String,
    /// Hostname or address. May itself contain colons.
    pub host: String,
    /// Port exactly as the marketplace reported it.
    pub port: String,
}

/// Errors raised while resolving a connection string.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum EndpointError {
    /// Raised when the string does not look like `<scheme>://user@host:port`.
    #[error("unexpected {scheme} connection string '{uri}': {reason}")]
    Format {
        /// Scheme the caller expected.
        scheme: Scheme,
        /// Offending connection string.
        uri: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl Endpoint {
    /// Resolves `uri` for the expected `scheme`.
    ///
    /// The port is split off at the last colon so hosts that contain colons
    /// still resolve. Surrounding whitespace, such as the trailing newline of
    /// CLI output, is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::Format`] when the prefix does not match, when
    /// the `@` or `:` separators are missing, or when any part is empty.
    pub fn parse(uri: &str, scheme: Scheme) -> Result<Self, EndpointError> {
        let trimmed = uri.trim();
        let fail = |reason: &str| EndpointError::Format {
            scheme,
            uri: trimmed.to_owned(),
            reason: reason.to_owned(),
        };

        let rest = trimmed
            .strip_prefix(scheme.prefix())
            .ok_or_else(|| fail(&format!("expected prefix {}", scheme.prefix())))?;
        let (user_host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| fail("missing ':' port separator"))?;
        let (user, host) = user_host
            .split_once('@')
            .ok_or_else(|| fail("missing '@' between user and host"))?;

        if user.is_empty() || host.is_empty() || port.is_empty() {
            return Err(fail("user, host, and port must all be present"));
        }

        Ok(Self {
            scheme,
            user: user.to_owned(),
            host: host.to_owned(),
            port: port.to_owned(),
        })
    }

    /// Returns the `user@host` login target used by `ssh` and `scp`.
    #[must_use]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Returns an `scp` remote spec for `path` on this endpoint.
    #[must_use]
    pub fn remote_spec(&self, path: &str) -> String {
        format!("{}:{path}", self.destination())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}@{}:{}",
            self.scheme.prefix(),
            self.user,
            self.host,
            self.port
        )
    }
}
