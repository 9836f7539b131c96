//! Watch subcommand implementation.
//!
//! Handles `reachback watch`, the periodic re-detection loop.

use crate::cli::{OutputFormat, ProbeArgs};
use crate::config::{AppSettings, FileConfigSource};
use crate::error::CliResult;
use crate::output;
use crate::watch::{WatchPolicy, WatchStats, Watcher};
use clap::Parser;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Re-run detection periodically until interrupted.
#[derive(Parser, Debug)]
pub struct WatchCommand {
    #[command(flatten)]
    pub args: ProbeArgs,

    /// Seconds between attempts (default 30)
    #[arg(short, long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Output format for each report
    #[arg(short, long, value_enum, default_value = "plain")]
    pub output: OutputFormat,
}

impl WatchCommand {
    /// Execute the watch command.
    pub async fn execute(&self, config_path: Option<&Path>, quiet: bool) -> CliResult<WatchStats> {
        let settings = AppSettings::load_or_default(config_path)?;
        let interval = self.interval.unwrap_or(settings.watch.interval_secs).max(1);

        let source = FileConfigSource::new(config_path.map(Path::to_path_buf))
            .with_overrides(self.args.overrides());
        let watcher = Watcher::new(source, WatchPolicy::new(Duration::from_secs(interval)));

        if !quiet {
            output::print_info(&format!("Checking every {}s (Ctrl-C to stop)", interval));
        }

        let format = self.output;
        let stats = watcher
            .run_until(
                async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!(error = %e, "failed to listen for Ctrl-C");
                        std::future::pending::<()>().await;
                    }
                },
                |report| match format {
                    OutputFormat::Plain if report.is_reachable() => {
                        output::print_success(&report.summary())
                    }
                    OutputFormat::Plain => output::print_warning(&report.summary()),
                    OutputFormat::Json => {
                        if let Err(e) = output::print_reports(std::slice::from_ref(report), format)
                        {
                            warn!(error = %e, "failed to print report");
                        }
                    }
                },
            )
            .await?;

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CliError, ConfigError};
    use std::io::Write;

    #[tokio::test]
    async fn test_watch_fails_on_incomplete_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "serverPort": 8066 }}"#).unwrap();

        let cmd = WatchCommand {
            args: ProbeArgs::default(),
            interval: Some(1),
            output: OutputFormat::Plain,
        };
        let result = cmd.execute(Some(file.path()), true).await;

        assert!(matches!(
            result,
            Err(CliError::Config(ConfigError::Missing("serverIP")))
        ));
    }
}
