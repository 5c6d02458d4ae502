//! Pruning of accumulated compare reports.

use std::path::Path;

use tracing::info;

use crate::artifacts::compare_dir;
use crate::domain::Result;

pub const DEFAULT_KEEP_COMPARE: usize = 20;

/// Delete all but the newest `keep` files in the compare directory.
///
/// Report names start with a sortable timestamp, so lexicographic order is
/// age order. A missing directory is not an error. Returns the number of
/// files removed.
pub fn clean_compare_reports(repo_root: &Path, keep: usize) -> Result<usize> {
    let dir = compare_dir(repo_root);
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            files.push(entry.file_name());
        }
    }
    files.sort();

    let excess = files.len().saturating_sub(keep);
    for name in &files[..excess] {
        std::fs::remove_file(dir.join(name))?;
    }
    info!(event = "clean.compare", removed = excess, kept = files.len() - excess);
    Ok(excess)
}
