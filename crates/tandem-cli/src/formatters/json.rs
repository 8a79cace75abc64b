//! JSON formatter for run reports.

use std::io::{self, Write};
use tandem_engine::Report;

pub struct JsonFormatter;

pub fn write_json(out: &mut dyn Write, report: &Report) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)
}
