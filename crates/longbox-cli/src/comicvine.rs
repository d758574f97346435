//! ComicVine `issues` endpoint client.
//!
//! One request per page, filtered to issues updated inside the sync window
//! and sorted by id, so offsets are stable across retries.

use std::time::Duration;

use chrono::NaiveDate;
use longbox_core::RemoteIssue;
use longbox_core::config::RemoteConfig;
use longbox_core::reconcile::{FetchError, IssueSource, Page};
use serde::Deserialize;
use tracing::trace;

/// `status_code` value ComicVine uses for a successful request.
const STATUS_OK: i64 = 1;

const FIELD_LIST: &str = "id,issue_number,volume";

/// HTTP statuses that refuse the request itself: bad key, or rate limited
/// (ComicVine answers 420 when throttling).
const REFUSED_HTTP: [u16; 4] = [401, 403, 420, 429];

#[derive(Debug, Deserialize)]
struct Envelope {
    status_code: i64,
    #[serde(default)]
    error: String,
    #[serde(default)]
    number_of_total_results: u64,
    #[serde(default)]
    results: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiIssue {
    id: u64,
    #[serde(default)]
    issue_number: Option<String>,
    volume: ApiVolume,
}

#[derive(Debug, Deserialize)]
struct ApiVolume {
    id: u64,
}

impl From<ApiIssue> for RemoteIssue {
    fn from(issue: ApiIssue) -> Self {
        Self {
            issue_id: issue.id,
            volume_id: issue.volume.id,
            label: issue.issue_number.unwrap_or_default(),
        }
    }
}

/// Pages through issues updated between two dates.
pub struct ComicVineClient {
    agent: ureq::Agent,
    endpoint: String,
    api_key: String,
    user_agent: String,
    start: NaiveDate,
    end: NaiveDate,
    requests: usize,
}

impl ComicVineClient {
    pub fn new(remote: &RemoteConfig, api_key: String, start: NaiveDate, end: NaiveDate) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(remote.timeout_secs))
            .timeout_connect(Duration::from_secs(remote.connect_timeout_secs))
            .build();

        Self {
            agent,
            endpoint: remote.endpoint.trim_end_matches('/').to_string(),
            api_key,
            user_agent: remote.user_agent.clone(),
            start,
            end,
            requests: 0,
        }
    }

    pub const fn request_count(&self) -> usize {
        self.requests
    }

    fn page_query(&self, offset: u64, limit: u64) -> Vec<(&'static str, String)> {
        vec![
            ("api_key", self.api_key.clone()),
            ("limit", limit.to_string()),
            ("format", "json".to_string()),
            ("offset", offset.to_string()),
            ("field_list", FIELD_LIST.to_string()),
            (
                "filter",
                format!(
                    "date_last_updated:{}|{}",
                    self.start.format("%Y-%m-%d"),
                    self.end.format("%Y-%m-%d")
                ),
            ),
            ("sort", "id".to_string()),
        ]
    }

    /// Build the page request; ureq percent-encodes every query value.
    fn page_request(&self, offset: u64, limit: u64) -> ureq::Request {
        self.page_query(offset, limit).iter().fold(
            self.agent
                .get(&format!("{}/issues/", self.endpoint))
                .set("User-Agent", &self.user_agent),
            |request, (name, value)| request.query(name, value),
        )
    }
}

impl IssueSource for ComicVineClient {
    fn fetch_page(&mut self, offset: u64, limit: u64) -> Result<Page, FetchError> {
        self.requests += 1;
        trace!(offset, limit, "requesting issues page");

        let response = self
            .page_request(offset, limit)
            .call()
            .map_err(|err| match err {
                ureq::Error::Status(code, response) => status_error(code, response.status_text()),
                ureq::Error::Transport(transport) => FetchError::Transport(transport.to_string()),
            })?;

        let body = response
            .into_string()
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        decode_page(&body)
    }
}

fn status_error(code: u16, message: &str) -> FetchError {
    if REFUSED_HTTP.contains(&code) {
        FetchError::Rejected {
            code: i64::from(code),
            message: message.to_string(),
        }
    } else {
        FetchError::Status {
            code: i64::from(code),
            message: message.to_string(),
        }
    }
}

/// Decode one `issues` response body.
///
/// A body that parses but carries a non-OK `status_code` means ComicVine
/// refused the query (invalid key, filter error, rate limit), which no
/// narrower window will fix.
fn decode_page(body: &str) -> Result<Page, FetchError> {
    let envelope: Envelope =
        serde_json::from_str(body).map_err(|err| FetchError::Decode(err.to_string()))?;

    if envelope.status_code != STATUS_OK {
        return Err(FetchError::Rejected {
            code: envelope.status_code,
            message: envelope.error,
        });
    }

    let issues: Vec<ApiIssue> = serde_json::from_value(envelope.results)
        .map_err(|err| FetchError::Decode(err.to_string()))?;

    Ok(Page {
        total: envelope.number_of_total_results,
        issues: issues.into_iter().map(RemoteIssue::from).collect(),
    })
}
