//! Per-attempt detection report.

use crate::types::{AddressSpec, AttemptId, DetectionOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// What one probe session did and how it ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    /// Unique identifier for this attempt.
    pub attempt_id: AttemptId,
    /// Candidate IP under test.
    pub candidate: IpAddr,
    /// Address announced to the server, if the session got that far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub announced: Option<AddressSpec>,
    /// Rendezvous server as configured (`host:port`).
    pub server: String,
    /// Terminal outcome.
    pub outcome: DetectionOutcome,
    /// Human-readable failure detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// When the attempt started.
    pub started_at: DateTime<Utc>,
    /// Total attempt duration in milliseconds.
    pub elapsed_ms: u64,
}

impl ProbeReport {
    /// Whether the candidate was proven reachable.
    pub fn is_reachable(&self) -> bool {
        self.outcome.is_success()
    }

    /// One-line summary.
    pub fn summary(&self) -> String {
        let target = self
            .announced
            .map(|a| a.to_string())
            .unwrap_or_else(|| self.candidate.to_string());
        format!(
            "{} via {} - {} [{:.2}s]",
            target,
            self.server,
            self.outcome,
            self.elapsed_ms as f64 / 1000.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcome: DetectionOutcome) -> ProbeReport {
        ProbeReport {
            attempt_id: AttemptId::new(),
            candidate: "198.51.100.7".parse().unwrap(),
            announced: Some("198.51.100.7:54321".parse().unwrap()),
            server: "203.0.113.5:8066".to_string(),
            outcome,
            detail: None,
            started_at: Utc::now(),
            elapsed_ms: 1500,
        }
    }

    #[test]
    fn test_summary() {
        let summary = report(DetectionOutcome::Success).summary();
        assert_eq!(
            summary,
            "198.51.100.7:54321 via 203.0.113.5:8066 - reachable [1.50s]"
        );
    }

    #[test]
    fn test_serialization_skips_empty_detail() {
        let json = serde_json::to_value(report(DetectionOutcome::Timeout)).unwrap();
        assert!(json.get("detail").is_none());
        assert_eq!(json["announced"], "198.51.100.7:54321");
        assert_eq!(json["outcome"]["kind"], "timeout");
    }
}
