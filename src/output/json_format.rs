//! JSON output formatting.

use crate::probe::ProbeReport;
use std::io::{self, Write};

/// Write reports as JSON: a single object for one report, an array otherwise.
pub fn write_json<W: Write>(out: &mut W, reports: &[ProbeReport]) -> io::Result<()> {
    let json = match reports {
        [single] => serde_json::to_string_pretty(single),
        many => serde_json::to_string_pretty(many),
    }
    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    writeln!(out, "{}", json)
}
