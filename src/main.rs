//! reachback - connect-back reachability checker.

use anyhow::Result;
use clap::Parser;
use reachback::cli::{Cli, Commands};
use reachback::output;
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Run the selected subcommand. `Ok(false)` means the command completed
/// but the address under test was not reachable.
async fn run(cli: Cli) -> Result<bool> {
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Probe(cmd) => Ok(cmd.execute(config, cli.quiet).await?),
        Commands::Serve(cmd) => {
            cmd.execute(config, cli.quiet).await?;
            Ok(true)
        }
        Commands::Watch(cmd) => {
            let stats = cmd.execute(config, cli.quiet).await?;
            if !cli.quiet {
                output::print_info(&format!(
                    "{} attempts, {} reachable",
                    stats.attempts, stats.successes
                ));
            }
            Ok(true)
        }
        Commands::Candidates(cmd) => {
            cmd.execute()?;
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(2)
        }
    }
}
