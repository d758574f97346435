//! Snapshot (`.mcl`) reader.
//!
//! Line 1 is the `Missing;<date>` header and is skipped. Every other
//! non-blank line is `<volume_id>;<issue_ids>;<labels>`. The two lists are
//! paired positionally, so a length mismatch is a fatal parse error rather
//! than a silent truncation.

use tracing::{debug, warn};

use crate::model::EntitySet;
use crate::snapshot::escape::unescape_label;
use crate::snapshot::{HEADER_PREFIX, SnapshotError};

/// Result of parsing a snapshot file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSnapshot {
    pub entities: EntitySet,
    /// Raw header line, kept for display only.
    pub header: String,
    /// Issue ids seen more than once; the later occurrence won.
    pub duplicates: usize,
    /// Number of volume records read.
    pub records: usize,
}

/// Parse snapshot text into an [`EntitySet`].
///
/// # Errors
///
/// Returns [`SnapshotError`] when the input is empty, a record has fewer than
/// three fields, an id is not an integer, or the id and label lists differ
/// in length.
pub fn parse_snapshot(text: &str) -> Result<ParsedSnapshot, SnapshotError> {
    let mut lines = text.lines();
    let Some(header) = lines.next() else {
        return Err(SnapshotError::Empty);
    };
    if !header.starts_with(HEADER_PREFIX) {
        warn!(header, "snapshot header does not start with {HEADER_PREFIX}");
    }

    let mut parsed = ParsedSnapshot {
        header: header.trim_end_matches('\r').to_string(),
        ..ParsedSnapshot::default()
    };

    for (index, raw) in lines.enumerate() {
        let line_no = index + 2;
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let record = parse_record(line, line_no)?;
        parsed.records += 1;

        for (issue_id, label) in record.issue_ids.into_iter().zip(record.labels) {
            if parsed.entities.contains(issue_id) {
                parsed.duplicates += 1;
                warn!(issue_id, line = line_no, "duplicate issue id in snapshot; later entry wins");
            }
            parsed.entities.merge(issue_id, record.volume_id, &label);
        }
    }

    debug!(
        issues = parsed.entities.len(),
        records = parsed.records,
        duplicates = parsed.duplicates,
        "parsed snapshot"
    );
    Ok(parsed)
}

#[derive(Debug)]
struct Record {
    volume_id: u64,
    issue_ids: Vec<u64>,
    labels: Vec<String>,
}

fn parse_record(line: &str, line_no: usize) -> Result<Record, SnapshotError> {
    let mut fields = line.splitn(3, ';');
    let (Some(volume_raw), Some(ids_raw), Some(labels_raw)) =
        (fields.next(), fields.next(), fields.next())
    else {
        return Err(SnapshotError::MissingField { line: line_no });
    };

    let volume_id = parse_id(volume_raw, line_no)?;
    let issue_ids = ids_raw
        .split(',')
        .map(|raw| parse_id(raw, line_no))
        .collect::<Result<Vec<_>, _>>()?;

    let label_list = strip_quotes(labels_raw);
    let mut labels: Vec<String> = split_labels(label_list)
        .into_iter()
        .map(|label| unescape_label(label).into_owned())
        .collect();

    // Older writers end every label list with a `,`.
    if label_list.ends_with(',')
        && labels.len() == issue_ids.len() + 1
        && labels.last().is_some_and(String::is_empty)
    {
        labels.pop();
        debug!(line = line_no, "dropped trailing label delimiter");
    }

    if issue_ids.len() != labels.len() {
        return Err(SnapshotError::MalformedRecord {
            line: line_no,
            ids: issue_ids.len(),
            labels: labels.len(),
        });
    }

    Ok(Record {
        volume_id,
        issue_ids,
        labels,
    })
}

fn parse_id(raw: &str, line_no: usize) -> Result<u64, SnapshotError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| SnapshotError::InvalidId {
            line: line_no,
            raw: raw.to_string(),
        })
}

/// Strip one pair of wrapping double quotes, if present.
fn strip_quotes(field: &str) -> &str {
    if field.len() >= 2 && field.starts_with('"') && field.ends_with('"') {
        &field[1..field.len() - 1]
    } else {
        field
    }
}

/// Split a label list on `,`, except where the comma is followed by a space.
///
/// Older snapshots carry labels such as `v. 1, no. 01` with raw commas.
fn split_labels(list: &str) -> Vec<&str> {
    let bytes = list.as_bytes();
    let mut labels = Vec::new();
    let mut start = 0;
    for (pos, byte) in bytes.iter().enumerate() {
        if *byte == b',' && bytes.get(pos + 1) != Some(&b' ') {
            labels.push(&list[start..pos]);
            start = pos + 1;
        }
    }
    labels.push(&list[start..]);
    labels
}
