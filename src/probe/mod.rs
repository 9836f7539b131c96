//! Probe client - proves a candidate address is reachable from outside.
//!
//! The client binds a listener on the candidate IP, announces it to a
//! rendezvous server it trusts, and waits (bounded) for the server to
//! connect back and push a token.

mod report;
mod session;
pub mod socket;

pub use report::ProbeReport;
pub use session::{detect, ProbeSession, ProbeState, CONNECT_TIMEOUT, RESPONSE_TIMEOUT};

use crate::config::ProbeConfig;
use futures::stream::{self, StreamExt};
use std::net::IpAddr;

/// Probe several candidate IPs against the same server.
///
/// Every candidate gets its own independent session (own listener, own
/// control connection). At most `concurrency` sessions run at once.
/// Reports come back in candidate order.
pub async fn probe_all(
    base: &ProbeConfig,
    candidates: Vec<IpAddr>,
    concurrency: usize,
) -> Vec<ProbeReport> {
    stream::iter(candidates)
        .map(|ip| detect(base.clone().with_client_ip(ip)))
        .buffered(concurrency.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerSettings;
    use crate::server::RendezvousServer;
    use crate::types::DetectionOutcome;
    use std::time::Duration;

    #[tokio::test]
    async fn test_probe_all_keeps_order() {
        let settings = ServerSettings {
            listen: "127.0.0.1:0".parse().unwrap(),
            ..ServerSettings::default()
        };
        let server = RendezvousServer::bind(settings).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());

        let base = ProbeConfig::new(
            addr.ip().to_string(),
            addr.port(),
            Duration::from_secs(5),
            "127.0.0.1".parse().unwrap(),
        );
        let candidates: Vec<IpAddr> = vec![
            "127.0.0.1".parse().unwrap(),
            "192.0.2.1".parse().unwrap(),
            "127.0.0.1".parse().unwrap(),
        ];

        let reports = probe_all(&base, candidates.clone(), 2).await;
        assert_eq!(reports.len(), 3);
        for (report, ip) in reports.iter().zip(&candidates) {
            assert_eq!(report.candidate, *ip);
        }
        assert_eq!(reports[0].outcome, DetectionOutcome::Success);
        assert_eq!(reports[1].outcome, DetectionOutcome::BindFailed);
        assert_eq!(reports[2].outcome, DetectionOutcome::Success);
    }
}
