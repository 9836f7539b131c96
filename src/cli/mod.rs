//! CLI subcommand definitions and handlers.
//!
//! Implements a git-like subcommand architecture:
//! - `reachback probe` - Test whether a candidate address is reachable
//! - `reachback serve` - Run the rendezvous server
//! - `reachback watch` - Re-run detection periodically
//! - `reachback candidates` - List local candidate addresses

mod probe;
mod serve;
mod watch;

pub use probe::{ProbeArgs, ProbeCommand};
pub use serve::ServeCommand;
pub use watch::WatchCommand;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// reachback - Check whether an address is reachable from the internet.
///
/// The probe listens on a candidate address and asks a rendezvous server
/// to connect back to it. The server side of the exchange is `serve`.
#[derive(Parser, Debug)]
#[command(name = "reachback")]
#[command(author = "HueCodes <huecodes@proton.me>")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Connect-back reachability checker", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to custom configuration file
    #[arg(long, global = true, value_name = "PATH", env = "REACHBACK_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one reachability check
    #[command(alias = "p")]
    Probe(ProbeCommand),

    /// Run the rendezvous server
    #[command(alias = "s")]
    Serve(ServeCommand),

    /// Re-run the check periodically until interrupted
    #[command(alias = "w")]
    Watch(WatchCommand),

    /// List local addresses usable as candidates
    #[command(alias = "c")]
    Candidates(CandidatesCommand),
}

/// List local candidate addresses.
#[derive(Parser, Debug)]
pub struct CandidatesCommand {
    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub output: OutputFormat,
}

impl CandidatesCommand {
    /// Print discovered candidates.
    pub fn execute(&self) -> crate::error::CliResult<()> {
        let candidates = crate::candidates::discover();
        match self.output {
            OutputFormat::Plain => {
                if candidates.is_empty() {
                    crate::output::print_warning("no candidate addresses found");
                }
                for ip in &candidates {
                    println!("{}", ip);
                }
            }
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&candidates)
                    .map_err(|e| crate::error::CliError::Other(e.to_string()))?;
                println!("{}", json);
            }
        }
        Ok(())
    }
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable plain text
    Plain,
    /// JSON structured output
    Json,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Plain
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
        }
    }
}
