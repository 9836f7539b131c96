//! The tagged result of one detection attempt.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side a failed connection was aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Peer {
    /// The rendezvous server (client side failure).
    Server,
    /// The announced candidate address (server side connect-back failure).
    Target,
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => write!(f, "server"),
            Self::Target => write!(f, "target"),
        }
    }
}

/// Outcome of a probe session or a server-side callback attempt.
///
/// Exactly one outcome is produced per session or attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DetectionOutcome {
    /// The candidate address received the connect-back and its payload.
    Success,
    /// The local listener could not be created.
    BindFailed,
    /// A connection could not be established.
    ConnectFailed(Peer),
    /// The control exchange went wrong or the server reported an error.
    ProtocolError(String),
    /// No callback connection arrived within the configured wait.
    Timeout,
}

impl DetectionOutcome {
    /// Whether reachability was proven.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Whether the failure points at the network path to the server
    /// rather than at the candidate address.
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::ConnectFailed(Peer::Server))
    }

    /// Short machine-friendly label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::BindFailed => "bind_failed",
            Self::ConnectFailed(Peer::Server) => "connect_failed_server",
            Self::ConnectFailed(Peer::Target) => "connect_failed_target",
            Self::ProtocolError(_) => "protocol_error",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for DetectionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "reachable"),
            Self::BindFailed => write!(f, "bind failed"),
            Self::ConnectFailed(peer) => write!(f, "cannot connect to {}", peer),
            Self::ProtocolError(reason) => write!(f, "protocol error: {}", reason),
            Self::Timeout => write!(f, "timed out waiting for callback"),
        }
    }
}
