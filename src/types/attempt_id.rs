//! Unique identifiers for detection attempts and server connections.
//!
//! `AttemptId` tags log spans and reports so that one probe session (or
//! one server-side callback attempt) can be followed end to end.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unique identifier for a detection attempt.
///
/// Uses UUID v4 internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(Uuid);

impl AttemptId {
    /// Generate a new random attempt ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get a short representation (first 8 characters), used in log spans.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AttemptId {
    type Err = AttemptIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::parse_str(s).map_err(|_| AttemptIdError(s.to_string()))?;
        Ok(Self(uuid))
    }
}

/// Error type for AttemptId parsing.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid attempt ID format: {0}")]
pub struct AttemptIdError(String);
