pub mod sync;
pub mod verify;

use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context as _, Result};
use longbox_core::error::ErrorCode;

use crate::output::CodedError;

/// Read a snapshot file, tagging a missing file with its error code.
pub fn read_snapshot(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(err) if err.kind() == ErrorKind::NotFound => Err(CodedError::new(
            ErrorCode::SnapshotNotFound,
            format!("snapshot {} not found", path.display()),
        )
        .into()),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}
