//! Snapshot (`.mcl`) writer.
//!
//! Output is deterministic: the same entity set and date always render to the
//! same bytes, which is what makes `parse -> render` byte-stable.

use std::borrow::Cow;
use std::fmt::Write as _;

use chrono::NaiveDate;

use crate::model::EntitySet;
use crate::snapshot::HEADER_PREFIX;
use crate::snapshot::escape::{escape_label, needs_quoting};

/// Render the full snapshot, header included.
#[must_use]
pub fn render_snapshot(entities: &EntitySet, synced_through: NaiveDate) -> String {
    let mut out = format!("{HEADER_PREFIX}{}\n", synced_through.format("%Y-%m-%d"));

    for (volume_id, issues) in entities.volumes() {
        let ids = issues
            .keys()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let labels: Vec<Cow<'_, str>> = issues.values().map(|label| escape_label(label)).collect();
        let joined = labels.join(",");

        if needs_quoting(labels.iter().map(AsRef::as_ref)) {
            let _ = writeln!(out, "{volume_id};{ids};\"{joined}\"");
        } else {
            let _ = writeln!(out, "{volume_id};{ids};{joined}");
        }
    }

    out
}

/// Render deletion candidates, one id per line in ascending order.
#[must_use]
pub fn render_deletion_list(ids: impl IntoIterator<Item = u64>) -> String {
    let mut sorted: Vec<u64> = ids.into_iter().collect();
    sorted.sort_unstable();

    let mut out = String::with_capacity(sorted.len() * 8);
    for id in sorted {
        let _ = writeln!(out, "{id}");
    }
    out
}
