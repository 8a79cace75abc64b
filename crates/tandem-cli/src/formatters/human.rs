//! Human-readable formatter for run reports.

use colored::*;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tandem_engine::{AdvisoryKind, Edit, Report};

pub struct HumanFormatter;

pub fn write_report(out: &mut dyn Write, report: &Report) -> io::Result<()> {
    write_edits(out, report)?;
    write_skipped(out, report)?;
    write_advisories(out, report)?;
    write_failures(out, report)?;
    write_summary(out, report)
}

fn write_edits(out: &mut dyn Write, report: &Report) -> io::Result<()> {
    let mut by_manifest: BTreeMap<&PathBuf, Vec<&Edit>> = BTreeMap::new();
    for edit in &report.applied {
        by_manifest.entry(&edit.path).or_default().push(edit);
    }

    for (path, edits) in by_manifest {
        writeln!(out, "{}", relative(&report.root, path).bold())?;
        for edit in edits {
            let change = match (&edit.old_range, &edit.new_range) {
                (Some(old), Some(new)) => format!(
                    "{} {} {} {}",
                    edit.name,
                    old.dimmed(),
                    "->".dimmed(),
                    new.green()
                ),
                (None, Some(new)) => format!("{} {} {}", "+".green(), edit.name, new.green()),
                (Some(old), None) => format!("{} {} {}", "-".red(), edit.name, old.dimmed()),
                (None, None) => edit.name.clone(),
            };
            let pin = if edit.overrides_pin {
                format!(" {}", "(pin overridden)".yellow())
            } else {
                String::new()
            };
            writeln!(out, "  {:<22} {}{}", edit.field.label().dimmed(), change, pin)?;
        }
    }
    Ok(())
}

fn write_skipped(out: &mut dyn Write, report: &Report) -> io::Result<()> {
    if report.skipped.is_empty() {
        return Ok(());
    }
    writeln!(out, "\n{}", "Skipped".bold())?;
    for entry in &report.skipped {
        writeln!(
            out,
            "  {} [{}] {} {}  {}",
            relative(&report.root, &entry.path),
            entry.field,
            entry.name,
            entry.range.dimmed(),
            entry.reason.to_string().yellow()
        )?;
    }
    Ok(())
}

fn write_advisories(out: &mut dyn Write, report: &Report) -> io::Result<()> {
    if report.advisories.is_empty() {
        return Ok(());
    }
    writeln!(out, "\n{}", "Advisories".bold())?;
    for advisory in &report.advisories {
        let marker = match advisory.kind {
            AdvisoryKind::RegistryFailure | AdvisoryKind::ManifestParseFailure => "!".red(),
            AdvisoryKind::LockfileStaleReminder => "i".cyan(),
            _ => "!".yellow(),
        };
        writeln!(out, "  {} {}", marker, advisory.message)?;
    }
    Ok(())
}

fn write_failures(out: &mut dyn Write, report: &Report) -> io::Result<()> {
    if report.failures.is_empty() {
        return Ok(());
    }
    writeln!(out, "\n{}", "Failed writes".red().bold())?;
    for failure in &report.failures {
        writeln!(
            out,
            "  {} {}: {}",
            "x".red(),
            relative(&report.root, &failure.path),
            failure.message
        )?;
    }
    Ok(())
}

fn write_summary(out: &mut dyn Write, report: &Report) -> io::Result<()> {
    let edits = report.applied.len();
    let manifests = report.written_paths().len();
    let counted = format!(
        "{} {} in {} {}",
        edits,
        plural(edits, "change", "changes"),
        manifests,
        plural(manifests, "manifest", "manifests")
    );

    writeln!(out)?;
    if let Some(error) = &report.error {
        if edits > 0 {
            writeln!(out, "{} {}", "Partially applied:".yellow().bold(), counted)?;
        }
        writeln!(out, "{} {}", "Stopped:".red().bold(), error)
    } else if edits == 0 {
        writeln!(out, "{}", "Nothing to change".green())
    } else if report.dry_run {
        writeln!(out, "{} {} (nothing written)", "Dry run:".cyan().bold(), counted)
    } else {
        writeln!(out, "{} {}", "Applied".green().bold(), counted)
    }
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 {
        one
    } else {
        many
    }
}
