use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use chrono::NaiveDate;
use clap::Args;
use longbox_core::snapshot::{HEADER_PREFIX, parse_snapshot, render_snapshot};
use serde::Serialize;
use tracing::debug;

use crate::cmd::read_snapshot;
use crate::output::{OutputMode, kv, render};

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Snapshot file to check.
    #[arg(value_name = "SNAPSHOT")]
    pub snapshot: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct VerifyReport {
    pub path: PathBuf,
    pub header: String,
    pub synced_through: Option<NaiveDate>,
    pub issues: usize,
    pub volumes: usize,
    pub records: usize,
    pub duplicates: usize,
    /// Re-rendering the parsed snapshot reproduces the file byte for byte.
    pub canonical: bool,
}

pub fn run_verify(args: &VerifyArgs, output: OutputMode) -> Result<()> {
    let text = read_snapshot(&args.snapshot)?;
    let report = verify_text(&args.snapshot, &text)?;
    render(output, &report, |report, w| print_report(report, w))
}

fn verify_text(path: &std::path::Path, text: &str) -> Result<VerifyReport> {
    let parsed =
        parse_snapshot(text).with_context(|| format!("failed to parse {}", path.display()))?;

    let synced_through = parsed
        .header
        .strip_prefix(HEADER_PREFIX)
        .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok());

    let canonical =
        synced_through.is_some_and(|date| render_snapshot(&parsed.entities, date) == text);
    debug!(canonical, "compared snapshot against canonical rendering");

    Ok(VerifyReport {
        path: path.to_path_buf(),
        synced_through,
        issues: parsed.entities.len(),
        volumes: parsed.entities.volumes().len(),
        records: parsed.records,
        duplicates: parsed.duplicates,
        header: parsed.header,
        canonical,
    })
}

fn print_report(report: &VerifyReport, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "lbx verify {}", report.path.display())?;
    kv(w, "header", &report.header)?;
    kv(w, "issues", report.issues)?;
    kv(w, "volumes", report.volumes)?;
    kv(w, "records", report.records)?;
    kv(w, "duplicates", report.duplicates)?;
    kv(w, "canonical", if report.canonical { "yes" } else { "no" })?;
    Ok(())
}
