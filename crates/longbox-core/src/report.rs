//! End-of-run counters.
//!
//! The reconciler fills a [`RunReport`] as it goes; nothing here has side
//! effects. The CLI renders it as text or JSON.

use serde::Serialize;

/// A remote record that could not be fetched even at page size one.
///
/// The catalog never returns the id of a record it fails to serve, so the
/// record is identified by its position in the id-sorted feed, plus the id of
/// the last issue processed before it when one exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoisonedRecord {
    pub offset: u64,
    pub after_issue_id: Option<u64>,
}

impl std::fmt::Display for PoisonedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.after_issue_id {
            Some(id) => write!(f, "offset {} (after issue {id})", self.offset),
            None => write!(f, "offset {}", self.offset),
        }
    }
}

/// Counters accumulated during one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Issues not present in the input snapshot.
    pub added: usize,
    /// Known issues whose label or volume changed.
    pub updated: usize,
    /// Known issues returned unchanged.
    pub unchanged: usize,
    /// Records excluded from this run because they faulted.
    pub skipped: usize,
    /// Input issues the remote feed did not return.
    pub not_reconfirmed: usize,
    /// Successful page fetches, degraded ones included.
    pub pages_fetched: usize,
    /// Failed fetch attempts that were retried at full page size.
    pub retries: usize,
    /// Duplicate ids found while parsing the input snapshot.
    pub duplicates_in_snapshot: usize,
    /// Total issues in the written snapshot.
    pub total_issues: usize,
    pub faults: Vec<PoisonedRecord>,
}

impl RunReport {
    /// Issues returned by the remote that were already known.
    #[must_use]
    pub const fn already_known(&self) -> usize {
        self.updated + self.unchanged
    }

    /// Fault offsets joined by `;`, empty when nothing faulted.
    #[must_use]
    pub fn fault_ids_display(&self) -> String {
        self.faults
            .iter()
            .map(|fault| fault.offset.to_string())
            .collect::<Vec<_>>()
            .join(";")
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }
}
