//! Output formatting module.
//!
//! Provides formatters for plain text and JSON output of probe reports.

mod json_format;
mod plain;

pub use json_format::write_json;
pub use plain::{
    print_error, print_info, print_probe_header, print_success, print_warning, write_plain,
};

use crate::cli::OutputFormat;
use crate::probe::ProbeReport;
use std::io::{self, Write};

/// Format and print reports according to the specified format.
pub fn print_reports(reports: &[ProbeReport], format: OutputFormat) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_reports(&mut out, reports, format)
}

/// Format reports into any writer.
pub fn write_reports<W: Write>(
    out: &mut W,
    reports: &[ProbeReport],
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Plain => write_plain(out, reports),
        OutputFormat::Json => write_json(out, reports),
    }
}
