//! Serve subcommand implementation.
//!
//! Handles `reachback serve`, running the rendezvous server until Ctrl-C.

use crate::config::AppSettings;
use crate::error::CliResult;
use crate::output;
use crate::server::RendezvousServer;
use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use tracing::warn;

/// Run the rendezvous server.
#[derive(Parser, Debug)]
pub struct ServeCommand {
    /// Address to accept control connections on (default 0.0.0.0:8066)
    #[arg(short, long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    /// Seconds allowed for each read, connect-back and write
    #[arg(long, value_name = "SECS")]
    pub step_timeout: Option<u64>,

    /// Length of the random token sent on the connect-back
    #[arg(long, value_name = "CHARS")]
    pub token_length: Option<usize>,

    /// Maximum connections processed at once
    #[arg(short = 'w', long, value_name = "N")]
    pub max_workers: Option<usize>,
}

impl ServeCommand {
    /// Execute the serve command.
    pub async fn execute(&self, config_path: Option<&Path>, quiet: bool) -> CliResult<()> {
        let mut settings = AppSettings::load_or_default(config_path)?.server;
        if let Some(listen) = self.listen {
            settings.listen = listen;
        }
        if let Some(secs) = self.step_timeout {
            settings.step_timeout_secs = secs;
        }
        if let Some(length) = self.token_length {
            settings.token_length = length;
        }
        if let Some(workers) = self.max_workers {
            settings.max_workers = workers;
        }

        let server = RendezvousServer::bind(settings).await?;
        if !quiet {
            output::print_info(&format!(
                "Rendezvous server listening on {} (Ctrl-C to stop)",
                server.local_addr()?
            ));
        }

        server
            .run_until(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "failed to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            })
            .await;

        Ok(())
    }
}
