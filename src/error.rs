//! Error types for reachback.
//!
//! Uses `thiserror` for ergonomic error definitions. Protocol failures map
//! onto a [`DetectionOutcome`] so every session ends in exactly one outcome.

use crate::protocol::Response;
use crate::types::{AddressError, DetectionOutcome, Peer};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of one probe session (client side).
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot announce candidate: {0}")]
    UnannounceableCandidate(#[from] AddressError),

    #[error("failed to resolve server '{host}': {reason}")]
    Resolve { host: String, reason: String },

    #[error("failed to connect to server {server}: {reason}")]
    ConnectServer { server: String, reason: String },

    #[error("failed to send announcement: {0}")]
    Announce(#[source] io::Error),

    #[error("failed to read server response: {0}")]
    Response(String),

    #[error("server rejected announcement: {0}")]
    Rejected(Response),

    #[error("no callback within {0:?}")]
    CallbackTimeout(Duration),

    #[error("callback connection failed: {0}")]
    Callback(String),
}

impl ProbeError {
    /// The outcome this error terminates the session with.
    pub fn outcome(&self) -> DetectionOutcome {
        match self {
            Self::Bind { .. } => DetectionOutcome::BindFailed,
            Self::Resolve { .. } | Self::ConnectServer { .. } => {
                DetectionOutcome::ConnectFailed(Peer::Server)
            }
            Self::UnannounceableCandidate(e) => DetectionOutcome::ProtocolError(e.to_string()),
            Self::Announce(e) => DetectionOutcome::ProtocolError(e.to_string()),
            Self::Response(reason) | Self::Callback(reason) => {
                DetectionOutcome::ProtocolError(reason.clone())
            }
            Self::Rejected(response) => DetectionOutcome::ProtocolError(response.to_string()),
            Self::CallbackTimeout(_) => DetectionOutcome::Timeout,
        }
    }
}

/// Failure of one server-side callback attempt.
///
/// Never fatal to the server: each one becomes an error response on the
/// control connection.
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error("failed to read announcement: {0}")]
    ReadFailed(String),

    #[error("failed to parse announcement '{text}': {source}")]
    ParseFailed {
        text: String,
        #[source]
        source: AddressError,
    },

    #[error("cannot connect back to {target}: {reason}")]
    ConnectFailed { target: String, reason: String },

    #[error("failed to send token to {target}: {reason}")]
    SendFailed { target: String, reason: String },
}

impl AttemptError {
    /// Response to send on the control connection.
    pub fn response(&self) -> Response {
        match self {
            Self::ReadFailed(_) | Self::ParseFailed { .. } => Response::InvalidAddress,
            Self::ConnectFailed { .. } => Response::CannotConnect,
            Self::SendFailed { .. } => Response::SendFailed,
        }
    }

    /// Outcome of the attempt as seen from the server.
    pub fn outcome(&self) -> DetectionOutcome {
        match self {
            Self::ConnectFailed { .. } => DetectionOutcome::ConnectFailed(Peer::Target),
            other => DetectionOutcome::ProtocolError(other.to_string()),
        }
    }
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("invalid configuration format: {0}")]
    InvalidFormat(String),

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidFormat(e.to_string())
    }
}

/// Errors surfaced by CLI subcommands.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type alias for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_error_outcomes() {
        let bind = ProbeError::Bind {
            addr: "192.0.2.1:0".into(),
            source: io::Error::from(io::ErrorKind::AddrNotAvailable),
        };
        assert_eq!(bind.outcome(), DetectionOutcome::BindFailed);

        let connect = ProbeError::ConnectServer {
            server: "203.0.113.5:8066".into(),
            reason: "refused".into(),
        };
        assert_eq!(connect.outcome(), DetectionOutcome::ConnectFailed(Peer::Server));

        let rejected = ProbeError::Rejected(Response::CannotConnect);
        assert_eq!(
            rejected.outcome(),
            DetectionOutcome::ProtocolError(
                "ERROR: Cannot connect to specified address".to_string()
            )
        );

        assert_eq!(
            ProbeError::CallbackTimeout(Duration::from_secs(2)).outcome(),
            DetectionOutcome::Timeout
        );
    }

    #[test]
    fn test_attempt_error_responses() {
        let parse = AttemptError::ParseFailed {
            text: "garbage".into(),
            source: AddressError::MissingPort,
        };
        assert_eq!(parse.response(), Response::InvalidAddress);

        let connect = AttemptError::ConnectFailed {
            target: "198.51.100.7:54321".into(),
            reason: "refused".into(),
        };
        assert_eq!(connect.response(), Response::CannotConnect);
        assert_eq!(connect.outcome(), DetectionOutcome::ConnectFailed(Peer::Target));

        let send = AttemptError::SendFailed {
            target: "198.51.100.7:54321".into(),
            reason: "reset".into(),
        };
        assert_eq!(send.response(), Response::SendFailed);
        assert!(!send.outcome().is_success());
    }
}
