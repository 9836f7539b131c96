//! Plain text output formatting.
//!
//! Produces human-readable output with colors and formatting.

use crate::probe::ProbeReport;
use crate::types::DetectionOutcome;
use console::{style, Style};
use std::io::{self, Write};

const RULE: &str = "═══════════════════════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────────────────────";

/// Write reports in human-readable plain text format.
pub fn write_plain<W: Write>(out: &mut W, reports: &[ProbeReport]) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(
        out,
        "                 {} Reachability Results",
        style("reachback").cyan().bold()
    )?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)?;

    if reports.is_empty() {
        writeln!(out, "  {}", style("No candidates probed.").dim())?;
        writeln!(out)?;
        return Ok(());
    }

    if let Some(first) = reports.first() {
        writeln!(out, "  {} {}", style("Server:").bold(), first.server)?;
    }
    let reachable = reports.iter().filter(|r| r.is_reachable()).count();
    writeln!(
        out,
        "  {} {} reachable, {} not reachable",
        style("Summary:").bold(),
        style(reachable).green().bold(),
        style(reports.len() - reachable).red()
    )?;
    writeln!(out)?;

    writeln!(out, "  {}", style(THIN_RULE).dim())?;
    writeln!(
        out,
        "  {:<40}  {:<22}  {:>7}",
        style("ANNOUNCED").bold(),
        style("OUTCOME").bold(),
        style("TIME").bold()
    )?;
    writeln!(out, "  {}", style(THIN_RULE).dim())?;

    for report in reports {
        let address = report
            .announced
            .map(|a| a.to_string())
            .unwrap_or_else(|| report.candidate.to_string());
        writeln!(
            out,
            "  {:<40}  {:<22}  {:>6.2}s",
            address,
            outcome_style(&report.outcome).apply_to(report.outcome.label()),
            report.elapsed_ms as f64 / 1000.0
        )?;
        if let Some(detail) = &report.detail {
            writeln!(out, "    {}", style(truncate_string(detail, 70)).dim())?;
        }
    }

    writeln!(out, "  {}", style(THIN_RULE).dim())?;
    writeln!(out)?;

    Ok(())
}

fn outcome_style(outcome: &DetectionOutcome) -> Style {
    match outcome {
        DetectionOutcome::Success => Style::new().green().bold(),
        DetectionOutcome::Timeout => Style::new().yellow(),
        _ => Style::new().red(),
    }
}

/// Print a header before probing begins.
pub fn print_probe_header(server: &str, candidates: usize, timeout_secs: u64) {
    eprintln!();
    eprintln!(
        "{} {} v{}",
        style("Starting").cyan(),
        style("reachback").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("{} Server: {}", style("•").dim(), style(server).yellow());
    eprintln!(
        "{} Probing {} candidate(s), callback wait {}s...",
        style("•").dim(),
        style(candidates).white().bold(),
        timeout_secs
    );
    eprintln!();
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an info message.
pub fn print_info(msg: &str) {
    eprintln!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Truncate a string to a maximum length, adding ellipsis if truncated.
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttemptId;
    use chrono::Utc;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 8), "hello...");
    }

    #[test]
    fn test_plain_lists_every_report() {
        let reports = vec![
            ProbeReport {
                attempt_id: AttemptId::new(),
                candidate: "198.51.100.7".parse().unwrap(),
                announced: Some("198.51.100.7:54321".parse().unwrap()),
                server: "203.0.113.5:8066".to_string(),
                outcome: DetectionOutcome::Success,
                detail: None,
                started_at: Utc::now(),
                elapsed_ms: 120,
            },
            ProbeReport {
                attempt_id: AttemptId::new(),
                candidate: "2001:db8::1".parse().unwrap(),
                announced: None,
                server: "203.0.113.5:8066".to_string(),
                outcome: DetectionOutcome::BindFailed,
                detail: Some("failed to bind listener".to_string()),
                started_at: Utc::now(),
                elapsed_ms: 1,
            },
        ];

        let mut buf = Vec::new();
        write_plain(&mut buf, &reports).unwrap();
        let text = console::strip_ansi_codes(&String::from_utf8(buf).unwrap()).to_string();
        assert!(text.contains("198.51.100.7:54321"));
        assert!(text.contains("2001:db8::1"));
        assert!(text.contains("bind_failed"));
        assert!(text.contains("failed to bind listener"));
        assert!(text.contains("1 reachable, 1 not reachable"));
    }
}
