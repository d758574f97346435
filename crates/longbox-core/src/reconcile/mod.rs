//! Paginated reconciliation of the entity set against a remote feed.
//!
//! The feed is walked in windows of `page_size` issues. Every successful page
//! is merged into the entity set and refreshes the loop bound from the
//! server-reported total. Failing windows go through a fixed state machine:
//!
//! ```text
//!            ok                        fault, attempts left
//! Fetching ──────► Fetching/Done   Fetching ────────────► Retrying ──► Fetching
//!     │ fault, retries exhausted
//!     ▼
//! Degrading(page_size - 1) ── fault, limit > 1 ──► Degrading(limit - 1)
//!     │ ok: record at offset + limit is poisoned     │ fault, limit == 1
//!     ▼                                              ▼
//! Fetching (offset += limit + 1)                 Skipping (offset += 1) ──► Fetching
//! ```
//!
//! Each pass through `Skipping` or a successful `Degrading` step moves the
//! offset forward by at least one, so a poisoned record cannot livelock the
//! run. A [`FetchError::Rejected`] from any state ends the run with an error.

pub mod source;

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::{debug, info, warn};

pub use source::{FetchError, IssueSource, Page};

use crate::model::{EntitySet, MergeOutcome};
use crate::report::{PoisonedRecord, RunReport};
use crate::snapshot::escape::normalize_remote_label;

/// Default number of issues requested per page.
pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// Default number of extra attempts for a full-size page.
pub const DEFAULT_MAX_RETRIES: u32 = 4;

/// Tuning for one reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileConfig {
    pub page_size: u64,
    pub max_retries: u32,
    /// Pause before each full-size retry.
    pub retry_delay: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::ZERO,
        }
    }
}

/// Where the pagination state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    /// Requesting a full-size page at the current offset.
    Fetching,
    /// Re-requesting the full-size page; `attempt` counts from 1.
    Retrying { attempt: u32 },
    /// Narrowing the window to locate a poisoned record.
    Degrading { limit: u64 },
    /// The record at the current offset fails even alone.
    Skipping,
    Done,
}

/// Everything a run produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub entities: EntitySet,
    /// Input issues the remote did not return this run. Flagged only.
    pub not_reconfirmed: BTreeSet<u64>,
    pub report: RunReport,
}

/// Drives the paginated merge.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    config: ReconcileConfig,
}

impl Reconciler {
    #[must_use]
    pub fn new(config: ReconcileConfig) -> Self {
        let page_size = config.page_size.max(1);
        Self {
            config: ReconcileConfig {
                page_size,
                ..config
            },
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Merge the whole remote feed into `entities`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Rejected`] when the remote refuses a request
    /// outright. Every other fetch failure goes through the retry / degrade /
    /// skip protocol and never aborts the run.
    pub fn run<S: IssueSource>(
        &self,
        entities: EntitySet,
        mut source: S,
    ) -> Result<ReconcileOutcome, FetchError> {
        let mut run = RunState::new(self.config, entities);
        let mut state = run.next_window();

        while state != FetchState::Done {
            state = run.step(state, &mut source)?;
        }

        Ok(run.finish())
    }
}

/// Mutable state scoped to a single run.
struct RunState {
    config: ReconcileConfig,
    entities: EntitySet,
    not_reconfirmed: BTreeSet<u64>,
    report: RunReport,
    offset: u64,
    /// Loop bound; optimistic until the first page reports the real total.
    total: u64,
    last_issue_id: Option<u64>,
}

impl RunState {
    fn new(config: ReconcileConfig, entities: EntitySet) -> Self {
        let not_reconfirmed = entities.ids().collect();
        Self {
            config,
            entities,
            not_reconfirmed,
            report: RunReport::default(),
            offset: 0,
            total: config.page_size,
            last_issue_id: None,
        }
    }

    fn next_window(&self) -> FetchState {
        if self.offset < self.total {
            FetchState::Fetching
        } else {
            FetchState::Done
        }
    }

    fn step<S: IssueSource>(
        &mut self,
        state: FetchState,
        source: &mut S,
    ) -> Result<FetchState, FetchError> {
        Ok(match state {
            FetchState::Fetching => self.fetch_full(0, source)?,
            FetchState::Retrying { attempt } => {
                if !self.config.retry_delay.is_zero() {
                    std::thread::sleep(self.config.retry_delay);
                }
                self.fetch_full(attempt, source)?
            }
            FetchState::Degrading { limit } => self.fetch_degraded(limit, source)?,
            FetchState::Skipping => {
                self.record_poisoned(self.offset);
                self.offset += 1;
                self.next_window()
            }
            FetchState::Done => FetchState::Done,
        })
    }

    fn fetch_full<S: IssueSource>(
        &mut self,
        attempt: u32,
        source: &mut S,
    ) -> Result<FetchState, FetchError> {
        let limit = self.config.page_size;
        debug!(offset = self.offset, limit, attempt, "fetching page");

        let state = match source.fetch_page(self.offset, limit) {
            Ok(page) => {
                self.apply_page(page);
                self.offset += limit;
                info!(
                    progress = self.offset.min(self.total),
                    total = self.total,
                    "fetched page"
                );
                self.next_window()
            }
            Err(err) if !err.is_recoverable() => return Err(self.rejected(err)),
            Err(err) if attempt < self.config.max_retries => {
                warn!(offset = self.offset, attempt, error = %err, "page fetch failed; retrying");
                self.report.retries += 1;
                FetchState::Retrying {
                    attempt: attempt + 1,
                }
            }
            Err(err) => {
                warn!(offset = self.offset, error = %err, "page fetch failed after retries; narrowing window");
                if limit > 1 {
                    FetchState::Degrading { limit: limit - 1 }
                } else {
                    FetchState::Skipping
                }
            }
        };
        Ok(state)
    }

    fn fetch_degraded<S: IssueSource>(
        &mut self,
        limit: u64,
        source: &mut S,
    ) -> Result<FetchState, FetchError> {
        debug!(offset = self.offset, limit, "fetching degraded page");

        let state = match source.fetch_page(self.offset, limit) {
            Ok(page) => {
                self.apply_page(page);
                // The window one record wider failed, so the culprit sits
                // just past this one, if the feed reaches that far.
                let culprit = self.offset + limit;
                if culprit < self.total {
                    self.record_poisoned(culprit);
                    self.offset = culprit + 1;
                } else {
                    self.offset = culprit;
                }
                self.next_window()
            }
            Err(err) if !err.is_recoverable() => return Err(self.rejected(err)),
            Err(err) if limit > 1 => {
                debug!(offset = self.offset, limit, error = %err, "degraded page failed");
                FetchState::Degrading { limit: limit - 1 }
            }
            Err(err) => {
                debug!(offset = self.offset, error = %err, "single-record page failed");
                FetchState::Skipping
            }
        };
        Ok(state)
    }

    fn rejected(&self, err: FetchError) -> FetchError {
        warn!(
            offset = self.offset,
            pages_fetched = self.report.pages_fetched,
            error = %err,
            "remote rejected the request; stopping"
        );
        err
    }

    fn apply_page(&mut self, page: Page) {
        self.total = page.total;
        self.report.pages_fetched += 1;

        for issue in page.issues {
            let label = normalize_remote_label(&issue.label);
            match self.entities.merge(issue.issue_id, issue.volume_id, &label) {
                MergeOutcome::Added => self.report.added += 1,
                MergeOutcome::Updated => self.report.updated += 1,
                MergeOutcome::Unchanged => self.report.unchanged += 1,
            }
            self.not_reconfirmed.remove(&issue.issue_id);
            self.last_issue_id = Some(issue.issue_id);
        }
    }

    fn record_poisoned(&mut self, offset: u64) {
        let fault = PoisonedRecord {
            offset,
            after_issue_id: self.last_issue_id,
        };
        warn!(%fault, "skipping record that fails to load");
        self.report.skipped += 1;
        self.report.faults.push(fault);
    }

    fn finish(self) -> ReconcileOutcome {
        let mut report = self.report;
        report.not_reconfirmed = self.not_reconfirmed.len();
        report.total_issues = self.entities.len();

        ReconcileOutcome {
            entities: self.entities,
            not_reconfirmed: self.not_reconfirmed,
            report,
        }
    }
}
