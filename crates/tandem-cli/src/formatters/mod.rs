//! Output formatters for run reports.

pub mod human;
pub mod json;

pub use human::HumanFormatter;
pub use json::JsonFormatter;

use std::io::{self, Write};
use tandem_engine::Report;

/// Trait for rendering a run report
pub trait Formatter {
    /// Write the report to `out`
    fn format(&self, report: &Report, out: &mut dyn Write) -> io::Result<()>;
}

impl Formatter for HumanFormatter {
    fn format(&self, report: &Report, out: &mut dyn Write) -> io::Result<()> {
        human::write_report(out, report)
    }
}

impl Formatter for JsonFormatter {
    fn format(&self, report: &Report, out: &mut dyn Write) -> io::Result<()> {
        json::write_json(out, report)
    }
}

/// Formatter for the `--json` flag
pub fn for_output(json: bool) -> Box<dyn Formatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(HumanFormatter)
    }
}
