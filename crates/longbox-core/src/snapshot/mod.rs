//! Snapshot (`.mcl`) codec.
//!
//! # Format
//!
//! ```text
//! Missing;2017-09-17
//! 100;1,3;1,3
//! 77901;5,6;"1.&@15,Annual 1"
//! ```
//!
//! - Line 1: `Missing;<date>` header.
//! - One line per volume, ascending by volume id.
//! - Issue ids ascending, comma-joined; labels in the same order.
//! - Labels are escaped with substitution tokens (see [`escape`]); the label
//!   list is wrapped in double quotes when any label contains a space or `"`.

pub mod escape;
pub mod parser;
pub mod writer;

pub use parser::{ParsedSnapshot, parse_snapshot};
pub use writer::{render_deletion_list, render_snapshot};

use crate::error::ErrorCode;

/// Header prefix of every snapshot file.
pub const HEADER_PREFIX: &str = "Missing;";

/// Errors raised while reading a snapshot. All of them are fatal: a corrupt
/// local database is never reconciled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    /// The input has no header line.
    #[error("snapshot is empty")]
    Empty,

    /// A record has fewer than the three `;`-separated fields.
    #[error("line {line}: expected <volume_id>;<issue_ids>;<labels>")]
    MissingField { line: usize },

    /// A volume or issue id is not an unsigned integer.
    #[error("line {line}: invalid id '{raw}'")]
    InvalidId { line: usize, raw: String },

    /// Issue id and label lists differ in length.
    #[error("line {line}: {ids} issue ids but {labels} labels")]
    MalformedRecord {
        line: usize,
        ids: usize,
        labels: usize,
    },
}

impl SnapshotError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Empty | Self::MissingField { .. } | Self::MalformedRecord { .. } => {
                ErrorCode::MalformedRecord
            }
            Self::InvalidId { .. } => ErrorCode::InvalidIssueId,
        }
    }
}
