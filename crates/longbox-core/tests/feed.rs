//! In-memory issue feed shared by the reconciler integration tests.
//!
//! Included with `#[path = "feed.rs"] mod feed;`.

#![allow(dead_code)]

use std::collections::{BTreeSet, VecDeque};

use longbox_core::RemoteIssue;
use longbox_core::reconcile::{FetchError, IssueSource, Page};

/// An id-sorted feed with injectable faults.
#[derive(Debug, Default)]
pub struct FakeFeed {
    pub issues: Vec<RemoteIssue>,
    /// Feed positions that fail every window containing them.
    pub poisoned: BTreeSet<u64>,
    /// Failures returned before any real answer, one per call.
    pub transient_failures: usize,
    /// Total reported on successive successful calls; the last one sticks.
    /// Empty means the real length of `issues`.
    pub reported_totals: VecDeque<u64>,
    pub calls: Vec<(u64, u64)>,
}

impl FakeFeed {
    pub fn new(issues: Vec<RemoteIssue>) -> Self {
        Self {
            issues,
            ..Self::default()
        }
    }

    pub fn with_poisoned(mut self, offsets: impl IntoIterator<Item = u64>) -> Self {
        self.poisoned.extend(offsets);
        self
    }

    fn next_total(&mut self) -> u64 {
        match self.reported_totals.len() {
            0 => self.issues.len() as u64,
            1 => self.reported_totals[0],
            _ => self.reported_totals.pop_front().unwrap_or_default(),
        }
    }
}

impl IssueSource for FakeFeed {
    fn fetch_page(&mut self, offset: u64, limit: u64) -> Result<Page, FetchError> {
        self.calls.push((offset, limit));

        if self.transient_failures > 0 {
            self.transient_failures -= 1;
            return Err(FetchError::Transport("timed out".to_string()));
        }

        if self.poisoned.range(offset..offset + limit).next().is_some() {
            return Err(FetchError::Decode("invalid UTF-8 in issue_number".to_string()));
        }

        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(self.issues.len());
        let end = usize::try_from(offset + limit)
            .unwrap_or(usize::MAX)
            .min(self.issues.len());

        Ok(Page {
            total: self.next_total(),
            issues: self.issues[start..end].to_vec(),
        })
    }
}

pub fn issue(issue_id: u64, volume_id: u64, label: &str) -> RemoteIssue {
    RemoteIssue {
        issue_id,
        volume_id,
        label: label.to_string(),
    }
}

/// `count` issues with ids `1..=count`, ten per volume.
pub fn numbered_issues(count: u64) -> Vec<RemoteIssue> {
    (1..=count)
        .map(|id| issue(id, 1000 + id / 10, &id.to_string()))
        .collect()
}
