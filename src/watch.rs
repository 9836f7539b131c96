//! Periodic re-detection loop.
//!
//! Orchestration around the probe core: run an attempt, decide how long
//! to wait, re-fetch configuration after failures, repeat.

use crate::config::{ConfigSource, ProbeConfig};
use crate::error::ConfigResult;
use crate::probe::{detect, ProbeReport};
use crate::types::DetectionOutcome;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Longest delay after repeated network errors.
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Attempts between summary log lines.
const SUMMARY_EVERY: u64 = 10;

/// Delay policy between detection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchPolicy {
    /// Normal delay between attempts.
    pub interval: Duration,
}

impl WatchPolicy {
    /// Create a policy with the given base interval.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Delay before the next attempt, given the number of consecutive
    /// network errors so far (including the latest attempt).
    pub fn delay(&self, network_errors: u32) -> Duration {
        match network_errors {
            0..=2 => self.interval,
            3..=4 => self.interval * 2,
            _ => MAX_BACKOFF,
        }
    }
}

impl Default for WatchPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

/// Running counters of a watch loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchStats {
    pub attempts: u64,
    pub successes: u64,
    pub network_errors: u32,
}

impl WatchStats {
    /// Account for one outcome.
    pub fn record(&mut self, outcome: &DetectionOutcome) {
        self.attempts += 1;
        if outcome.is_success() {
            self.successes += 1;
        }
        if outcome.is_network_error() {
            self.network_errors += 1;
        } else {
            self.network_errors = 0;
        }
    }
}

/// Re-detection loop over a [`ConfigSource`].
pub struct Watcher<S> {
    source: S,
    policy: WatchPolicy,
    stats: WatchStats,
}

impl<S: ConfigSource> Watcher<S> {
    /// Create a watcher.
    pub fn new(source: S, policy: WatchPolicy) -> Self {
        Self {
            source,
            policy,
            stats: WatchStats::default(),
        }
    }

    /// Counters so far.
    pub fn stats(&self) -> &WatchStats {
        &self.stats
    }

    /// Run one attempt and return its report with the delay to apply
    /// before the next one. `config` is replaced by a fresh fetch after a
    /// failed attempt; a failed fetch keeps the old record.
    pub async fn step(&mut self, config: &mut ProbeConfig) -> (ProbeReport, Duration) {
        let report = detect(config.clone()).await;
        self.stats.record(&report.outcome);

        if report.is_reachable() {
            info!(attempt = self.stats.attempts, "detection succeeded");
        } else {
            warn!(
                attempt = self.stats.attempts,
                outcome = report.outcome.label(),
                "detection failed, refreshing configuration"
            );
            match self.source.fetch().await {
                Ok(fresh) => *config = fresh,
                Err(e) => warn!(error = %e, "configuration refresh failed, keeping previous"),
            }
        }

        if self.stats.attempts % SUMMARY_EVERY == 0 {
            info!(
                attempts = self.stats.attempts,
                successes = self.stats.successes,
                network_errors = self.stats.network_errors,
                "watch summary"
            );
        }

        let delay = self.policy.delay(self.stats.network_errors);
        if self.stats.network_errors > 0 {
            warn!(
                network_errors = self.stats.network_errors,
                delay = ?delay,
                "network problem, backing off"
            );
        }
        (report, delay)
    }

    /// Loop until `shutdown` completes, handing every report to `on_report`.
    ///
    /// Fails only when the first configuration fetch fails; later fetch
    /// failures keep the previous record.
    pub async fn run_until<F, R>(
        mut self,
        shutdown: F,
        mut on_report: R,
    ) -> ConfigResult<WatchStats>
    where
        F: Future<Output = ()>,
        R: FnMut(&ProbeReport),
    {
        tokio::pin!(shutdown);

        let fetched = tokio::select! {
            _ = &mut shutdown => None,
            fetched = self.source.fetch() => Some(fetched),
        };
        let mut config = match fetched {
            Some(fetched) => fetched?,
            None => return Ok(self.stats),
        };
        info!(
            server = %config.server_display(),
            candidate = %config.client_ip,
            interval = ?self.policy.interval,
            "watch started"
        );

        loop {
            let (report, delay) = tokio::select! {
                _ = &mut shutdown => break,
                stepped = self.step(&mut config) => stepped,
            };
            on_report(&report);

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!(attempts = self.stats.attempts, "watch stopped");
        Ok(self.stats)
    }
}
