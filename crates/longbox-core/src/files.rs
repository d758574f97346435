//! Snapshot file naming, atomic output writes, and retirement of the input.
//!
//! # Layout
//!
//! ```text
//! <dir>/
//!   2017-09-11_latest.mcl    # input; renamed to 2017-09-11_missing.mcl on success
//!   2017-09-17_latest.mcl    # new snapshot
//!   2017-09-17_deleted.txt   # deletion candidates
//! ```
//!
//! # Invariants
//!
//! - Each output is written to `<name>.tmp`, synced, closed, then renamed.
//! - The input is retired only after both outputs are in place.
//! - A failed write removes its temp file and leaves the input untouched.

use std::fs::{self, File};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::ErrorCode;

/// Errors while persisting run outputs.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to retire {} as {}: {source}", from.display(), to.display())]
    Retire {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl OutputError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Write { .. } => ErrorCode::SnapshotWriteFailed,
            Self::Retire { .. } => ErrorCode::SnapshotRetireFailed,
        }
    }

    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

/// The files one sync run reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPaths {
    pub input: PathBuf,
    pub output: PathBuf,
    pub deletions: PathBuf,
    pub retired: PathBuf,
}

impl SnapshotPaths {
    /// Derive all paths in `dir` from the sync window.
    #[must_use]
    pub fn for_dates(dir: &Path, start: NaiveDate, end: NaiveDate) -> Self {
        let start = start.format("%Y-%m-%d");
        let end = end.format("%Y-%m-%d");
        Self {
            input: dir.join(format!("{start}_latest.mcl")),
            output: dir.join(format!("{end}_latest.mcl")),
            deletions: dir.join(format!("{end}_deleted.txt")),
            retired: dir.join(format!("{start}_missing.mcl")),
        }
    }
}

/// Write `contents` to `path` through a synced temp file and a rename.
///
/// # Errors
///
/// Returns [`OutputError::Write`] if any step fails; the temp file is removed.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), OutputError> {
    let tmp = temp_path(path);

    let result = (|| -> io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, path)
    })();

    if let Err(source) = result {
        let _ = fs::remove_file(&tmp);
        return Err(OutputError::Write {
            path: path.to_path_buf(),
            source,
        });
    }

    debug!(path = %path.display(), bytes = contents.len(), "wrote file");
    Ok(())
}

/// Write the new snapshot and the deletion list.
///
/// # Errors
///
/// Returns the first [`OutputError::Write`]; the snapshot may already be in
/// place when the deletion list fails, but the input is never retired here.
pub fn write_outputs(
    paths: &SnapshotPaths,
    snapshot: &str,
    deletions: &str,
) -> Result<(), OutputError> {
    write_atomic(&paths.output, snapshot)?;
    write_atomic(&paths.deletions, deletions)?;
    info!(
        snapshot = %paths.output.display(),
        deletions = %paths.deletions.display(),
        "outputs written"
    );
    Ok(())
}

/// Rename the input snapshot to its retired name.
///
/// # Errors
///
/// Returns [`OutputError::Retire`] if the rename fails.
pub fn retire_snapshot(paths: &SnapshotPaths) -> Result<(), OutputError> {
    fs::rename(&paths.input, &paths.retired).map_err(|source| OutputError::Retire {
        from: paths.input.clone(),
        to: paths.retired.clone(),
        source,
    })?;
    info!(retired = %paths.retired.display(), "input snapshot retired");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
