//! Remote page capability consumed by the reconciler.

use crate::error::ErrorCode;
use crate::model::RemoteIssue;

/// One page of the remote feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    /// Total number of results the server reports for the whole query.
    pub total: u64,
    pub issues: Vec<RemoteIssue>,
}

/// Failure fetching or decoding one page.
///
/// The reconciler recovers from every variant except [`FetchError::Rejected`],
/// which ends the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Network or HTTP-level failure, timeouts included.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered but flagged the request as failed.
    #[error("remote status {code}: {message}")]
    Status { code: i64, message: String },

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The server refused the request as a whole: bad key, bad filter, rate
    /// limit. No window size can succeed.
    #[error("remote rejected the request ({code}): {message}")]
    Rejected { code: i64, message: String },
}

impl FetchError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Rejected { .. } => ErrorCode::RemoteRejected,
            _ => ErrorCode::RemoteFetchFailed,
        }
    }

    /// Whether retrying or narrowing the window can get past this failure.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

/// A paginated, id-sorted remote issue feed.
///
/// Implementations must be idempotent: the reconciler re-requests the same
/// window when a fetch fails.
pub trait IssueSource {
    /// Fetch up to `limit` issues starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on any transport, status, or decode failure.
    fn fetch_page(&mut self, offset: u64, limit: u64) -> Result<Page, FetchError>;
}

impl<S: IssueSource + ?Sized> IssueSource for &mut S {
    fn fetch_page(&mut self, offset: u64, limit: u64) -> Result<Page, FetchError> {
        (**self).fetch_page(offset, limit)
    }
}
