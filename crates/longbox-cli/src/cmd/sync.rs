use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use chrono::NaiveDate;
use clap::Args;
use longbox_core::config::{API_KEY_ENV, LongboxConfig, resolve_api_key, resolve_config};
use longbox_core::error::ErrorCode;
use longbox_core::files::{SnapshotPaths, retire_snapshot, write_outputs};
use longbox_core::reconcile::{IssueSource, ReconcileConfig, Reconciler};
use longbox_core::snapshot::{ParsedSnapshot, parse_snapshot, render_deletion_list, render_snapshot};
use longbox_core::RunReport;
use serde::Serialize;
use tracing::{info, warn};

use crate::cmd::read_snapshot;
use crate::comicvine::ComicVineClient;
use crate::output::{CodedError, OutputMode, kv, render};

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Date of the current snapshot, `YYYY-MM-DD`.
    #[arg(value_name = "START")]
    pub start: String,

    /// Date to sync through, `YYYY-MM-DD`.
    #[arg(value_name = "END")]
    pub end: String,

    /// ComicVine API key. Falls back to COMICVINE_API_KEY, then config.
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Directory holding the snapshot files.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub dir: PathBuf,

    /// Issues requested per page.
    #[arg(long, value_name = "N")]
    pub page_size: Option<u64>,

    /// Extra attempts for a failing full-size page before narrowing it.
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Leave deletion candidates out of the new snapshot.
    #[arg(long)]
    pub prune: bool,
}

/// The dates bounding one sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SyncWindow {
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let start = parse_date(start)?;
        let end = parse_date(end)?;
        if end <= start {
            return Err(CodedError::new(
                ErrorCode::InvalidDateRange,
                format!("end date {end} must be after start date {start}"),
            )
            .into());
        }
        Ok(Self { start, end })
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|err| {
        CodedError::new(
            ErrorCode::InvalidDateRange,
            format!("invalid date '{raw}': {err}"),
        )
        .into()
    })
}

#[derive(Debug, Serialize)]
pub struct SyncSummary {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub snapshot: PathBuf,
    pub deletions: PathBuf,
    pub retired: PathBuf,
    pub pruned: bool,
    pub api_requests: usize,
    #[serde(flatten)]
    pub report: RunReport,
}

pub fn run_sync(args: &SyncArgs, output: OutputMode) -> Result<()> {
    let window = SyncWindow::parse(&args.start, &args.end)?;
    let config = resolve_config(&args.dir).map_err(|err| {
        err.context(CodedError::new(
            ErrorCode::ConfigParseError,
            "failed to load configuration",
        ))
    })?;

    let paths = SnapshotPaths::for_dates(&args.dir, window.start, window.end);
    let input = load_input(&paths)?;

    let env_key = std::env::var(API_KEY_ENV).ok();
    let Some(api_key) = resolve_api_key(args.api_key.as_deref(), env_key.as_deref(), &config.remote)
    else {
        return Err(CodedError::new(
            ErrorCode::MissingApiKey,
            "no ComicVine API key configured",
        )
        .into());
    };

    let reconcile = reconcile_config(&config, args);
    let mut client = ComicVineClient::new(&config.remote, api_key, window.start, window.end);

    info!(
        since = %window.start,
        through = %window.end,
        page_size = reconcile.page_size,
        "querying ComicVine for updated issues"
    );
    let mut summary = sync_snapshot(&paths, window, input, reconcile, args.prune, &mut client)?;
    summary.api_requests = client.request_count();

    render(output, &summary, |summary, w| print_summary(summary, w))
}

fn load_input(paths: &SnapshotPaths) -> Result<ParsedSnapshot> {
    let text = read_snapshot(&paths.input)?;
    let parsed = parse_snapshot(&text)
        .with_context(|| format!("failed to parse {}", paths.input.display()))?;
    info!(
        path = %paths.input.display(),
        issues = parsed.entities.len(),
        records = parsed.records,
        "loaded snapshot"
    );
    Ok(parsed)
}

fn reconcile_config(config: &LongboxConfig, args: &SyncArgs) -> ReconcileConfig {
    let mut sync = config.sync.clone();
    if let Some(page_size) = args.page_size {
        sync.page_size = page_size;
    }
    if let Some(max_retries) = args.max_retries {
        sync.max_retries = max_retries;
    }
    sync.to_reconcile_config()
}

/// Reconcile `input` against `source`, write both outputs, then retire the
/// input snapshot.
pub fn sync_snapshot<S: IssueSource>(
    paths: &SnapshotPaths,
    window: SyncWindow,
    input: ParsedSnapshot,
    config: ReconcileConfig,
    prune: bool,
    source: S,
) -> Result<SyncSummary> {
    let outcome = Reconciler::new(config)
        .run(input.entities, source)
        .map_err(|err| {
            anyhow::Error::new(CodedError::new(err.code(), err.to_string()))
                .context("sync stopped before writing; the input snapshot is unchanged")
        })?;

    let mut report = outcome.report;
    report.duplicates_in_snapshot = input.duplicates;

    let entities = if prune {
        outcome.entities.without(&outcome.not_reconfirmed)
    } else {
        outcome.entities
    };
    report.total_issues = entities.len();

    let snapshot = render_snapshot(&entities, window.end);
    let deletions = render_deletion_list(outcome.not_reconfirmed.iter().copied());

    write_outputs(paths, &snapshot, &deletions)?;
    retire_snapshot(paths)?;

    if !report.is_clean() {
        warn!(faults = %report.fault_ids_display(), "records skipped after server errors");
    }

    Ok(SyncSummary {
        start: window.start,
        end: window.end,
        snapshot: paths.output.clone(),
        deletions: paths.deletions.clone(),
        retired: paths.retired.clone(),
        pruned: prune,
        api_requests: 0,
        report,
    })
}

fn print_summary(summary: &SyncSummary, w: &mut dyn Write) -> io::Result<()> {
    let report = &summary.report;
    writeln!(w, "lbx sync {} {}", summary.start, summary.end)?;
    kv(w, "added", report.added)?;
    kv(w, "updated", report.updated)?;
    kv(w, "already in database", report.already_known())?;
    kv(w, "skipped", report.skipped)?;
    kv(w, "not reconfirmed", report.not_reconfirmed)?;
    kv(w, "duplicates in input", report.duplicates_in_snapshot)?;
    kv(w, "issues in snapshot", report.total_issues)?;
    kv(w, "pages fetched", report.pages_fetched)?;
    kv(w, "retries", report.retries)?;
    kv(w, "API requests", summary.api_requests)?;
    kv(w, "snapshot", summary.snapshot.display())?;
    kv(w, "deletion list", summary.deletions.display())?;
    if !report.is_clean() {
        kv(w, "server errors at", report.fault_ids_display())?;
    }
    Ok(())
}
