use std::fmt;

/// Machine-readable error codes surfaced by the CLI alongside human messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    SnapshotNotFound,
    ConfigParseError,
    MissingApiKey,
    InvalidDateRange,
    MalformedRecord,
    InvalidIssueId,
    RemoteFetchFailed,
    RemoteRejected,
    SnapshotWriteFailed,
    SnapshotRetireFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::SnapshotNotFound => "E1001",
            Self::ConfigParseError => "E1002",
            Self::MissingApiKey => "E1003",
            Self::InvalidDateRange => "E1004",
            Self::MalformedRecord => "E2001",
            Self::InvalidIssueId => "E2002",
            Self::RemoteFetchFailed => "E3001",
            Self::RemoteRejected => "E3002",
            Self::SnapshotWriteFailed => "E5001",
            Self::SnapshotRetireFailed => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::SnapshotNotFound => "Input snapshot not found",
            Self::ConfigParseError => "Config file parse error",
            Self::MissingApiKey => "ComicVine API key missing",
            Self::InvalidDateRange => "Invalid date range",
            Self::MalformedRecord => "Malformed snapshot record",
            Self::InvalidIssueId => "Invalid issue or volume id",
            Self::RemoteFetchFailed => "Remote page fetch failed",
            Self::RemoteRejected => "Remote rejected the request",
            Self::SnapshotWriteFailed => "Snapshot write failed",
            Self::SnapshotRetireFailed => "Snapshot retirement failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::SnapshotNotFound => {
                Some("Expected <dir>/<START>_latest.mcl; check --dir and the start date.")
            }
            Self::ConfigParseError => Some("Fix syntax in longbox.toml and retry."),
            Self::MissingApiKey => {
                Some("Pass --api-key, set COMICVINE_API_KEY, or add remote.api_key to longbox.toml.")
            }
            Self::InvalidDateRange => Some("Use YYYY-MM-DD dates with END after START."),
            Self::MalformedRecord | Self::InvalidIssueId => {
                Some("Restore the snapshot from the last retired *_missing.mcl file.")
            }
            Self::RemoteFetchFailed => None,
            Self::RemoteRejected => Some(
                "Check the API key and rate limit, then re-run the same window; nothing was written.",
            ),
            Self::SnapshotWriteFailed => Some("Check disk space and write permissions."),
            Self::SnapshotRetireFailed => Some(
                "The new snapshot was written; rename the old *_latest.mcl by hand before the next run.",
            ),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
