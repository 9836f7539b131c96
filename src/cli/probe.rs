//! Probe subcommand implementation.
//!
//! Handles `reachback probe` for one-shot reachability checks.

use crate::cli::OutputFormat;
use crate::config::{AppSettings, ProbeSettings};
use crate::error::{CliError, CliResult};
use crate::output;
use crate::probe::{detect, probe_all};
use clap::{Args, Parser};
use std::path::Path;

/// Probe settings that override the configuration file.
#[derive(Args, Debug, Clone, Default)]
pub struct ProbeArgs {
    /// Rendezvous server host name or IP
    #[arg(short = 's', long, value_name = "HOST")]
    pub server: Option<String>,

    /// Rendezvous server port
    #[arg(short = 'p', long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Seconds to wait for the connect-back
    #[arg(short = 't', long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Candidate IP to bind and announce
    #[arg(short = 'c', long = "client-ip", value_name = "IP")]
    pub client_ip: Option<String>,

    /// Seconds to wait for the server's response
    #[arg(long, value_name = "SECS")]
    pub response_timeout: Option<u64>,
}

impl ProbeArgs {
    /// Convert into an override set (unset values stay empty).
    pub fn overrides(&self) -> ProbeSettings {
        ProbeSettings {
            server_ip: self.server.clone().unwrap_or_default(),
            server_port: self.port.unwrap_or(0),
            timeout: self.timeout.unwrap_or(0),
            client_ip: self.client_ip.clone().unwrap_or_default(),
            response_timeout: self.response_timeout.unwrap_or(0),
        }
    }
}

/// Test whether a candidate address is reachable from the outside.
#[derive(Parser, Debug)]
pub struct ProbeCommand {
    #[command(flatten)]
    pub args: ProbeArgs,

    /// Probe every local candidate address instead of --client-ip
    #[arg(short = 'a', long, conflicts_with = "client_ip")]
    pub all_interfaces: bool,

    /// Maximum concurrent sessions with --all-interfaces
    #[arg(long, default_value = "4")]
    pub concurrency: usize,

    /// Output format for results
    #[arg(short, long, value_enum, default_value = "plain")]
    pub output: OutputFormat,
}

impl ProbeCommand {
    /// Execute the probe command. Returns whether every candidate was reachable.
    pub async fn execute(&self, config_path: Option<&Path>, quiet: bool) -> CliResult<bool> {
        let mut settings = AppSettings::load_or_default(config_path)?
            .probe
            .overridden_by(&self.args.overrides());

        let candidates = if self.all_interfaces {
            let found = crate::candidates::discover();
            let first = found
                .first()
                .ok_or_else(|| CliError::Other("no candidate addresses found".to_string()))?;
            settings.client_ip = first.to_string();
            Some(found)
        } else {
            None
        };

        let config = settings.into_config()?;

        if !quiet && self.output == OutputFormat::Plain {
            output::print_probe_header(
                &config.server_display(),
                candidates.as_ref().map_or(1, Vec::len),
                config.timeout.as_secs(),
            );
        }

        let reports = match candidates {
            Some(candidates) => probe_all(&config, candidates, self.concurrency).await,
            None => vec![detect(config).await],
        };

        output::print_reports(&reports, self.output)?;

        Ok(reports.iter().all(|r| r.is_reachable()))
    }
}
