//! Issue entities and the in-memory entity set.
//!
//! The entity set is keyed by ComicVine issue id. Volumes are not stored:
//! they only exist as the grouping built by [`EntitySet::volumes`] when a
//! snapshot is rendered.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Volume id and label for one known issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueEntry {
    pub volume_id: u64,
    /// Logical (unescaped) issue number, e.g. `1,5` or `v. 1, no. 01`.
    pub label: String,
}

/// A single issue as reported by the remote catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteIssue {
    pub issue_id: u64,
    pub volume_id: u64,
    pub label: String,
}

/// What [`EntitySet::merge`] did with an incoming issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Added,
    Updated,
    Unchanged,
}

/// Issues grouped by volume, both levels in ascending id order.
pub type VolumeGroups<'a> = BTreeMap<u64, BTreeMap<u64, &'a str>>;

/// Mapping from issue id to its volume and label.
///
/// Entries are only ever inserted or overwritten through [`merge`](Self::merge);
/// deletions are reported separately and never applied here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitySet {
    issues: BTreeMap<u64, IssueEntry>,
}

impl EntitySet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `issue_id`, reporting which case applied.
    pub fn merge(&mut self, issue_id: u64, volume_id: u64, label: &str) -> MergeOutcome {
        match self.issues.get_mut(&issue_id) {
            None => {
                self.issues.insert(
                    issue_id,
                    IssueEntry {
                        volume_id,
                        label: label.to_string(),
                    },
                );
                MergeOutcome::Added
            }
            Some(entry) if entry.volume_id == volume_id && entry.label == label => {
                MergeOutcome::Unchanged
            }
            Some(entry) => {
                entry.volume_id = volume_id;
                label.clone_into(&mut entry.label);
                MergeOutcome::Updated
            }
        }
    }

    #[must_use]
    pub fn get(&self, issue_id: u64) -> Option<&IssueEntry> {
        self.issues.get(&issue_id)
    }

    #[must_use]
    pub fn contains(&self, issue_id: u64) -> bool {
        self.issues.contains_key(&issue_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issue ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.issues.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &IssueEntry)> {
        self.issues.iter().map(|(id, entry)| (*id, entry))
    }

    /// A copy of this set without `excluded` ids. The set itself is untouched.
    #[must_use]
    pub fn without(&self, excluded: &BTreeSet<u64>) -> Self {
        Self {
            issues: self
                .issues
                .iter()
                .filter(|(id, _)| !excluded.contains(*id))
                .map(|(id, entry)| (*id, entry.clone()))
                .collect(),
        }
    }

    /// Build the volume grouping used for serialization.
    #[must_use]
    pub fn volumes(&self) -> VolumeGroups<'_> {
        let mut groups: VolumeGroups<'_> = BTreeMap::new();
        for (issue_id, entry) in &self.issues {
            groups
                .entry(entry.volume_id)
                .or_default()
                .insert(*issue_id, entry.label.as_str());
        }
        groups
    }
}
