//! Workspace file enumeration.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};
use walkdir::WalkDir;

use super::path_matcher::GlobFilter;
use crate::error::ScanError;

fn walk(root: &Path, filter: &GlobFilter) -> Result<Vec<PathBuf>, ScanError> {
    let mut found = BTreeSet::new();
    let entries = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !entry.file_type().is_dir() || !filter.prunes(entry.path())
        });

    for entry in entries {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && filter.accepts(entry.path()) {
                    found.insert(entry.into_path());
                }
            }
            Err(err) if err.depth() == 0 => {
                return Err(ScanError::Walk {
                    root: root.to_path_buf(),
                    message: err.to_string(),
                });
            }
            Err(err) => warn!(error = %err, "skipping unreadable directory entry"),
        }
    }

    debug!(root = %root.display(), files = found.len(), "resolved glob set");
    Ok(found.into_iter().collect())
}

/// List the files under `root` accepted by `filter`.
///
/// Excluded directories are pruned without being descended into. The result
/// is deduplicated and sorted. The traversal runs on the blocking pool.
///
/// # Errors
///
/// Returns [`ScanError::Walk`] when `root` itself cannot be read or the
/// traversal task fails. Unreadable entries below the root are skipped.
pub async fn find_matching_files(
    root: &Path,
    filter: Arc<GlobFilter>,
) -> Result<Vec<PathBuf>, ScanError> {
    let walk_root = root.to_path_buf();
    tokio::task::spawn_blocking(move || walk(&walk_root, &filter))
        .await
        .map_err(|err| ScanError::Walk {
            root: root.to_path_buf(),
            message: err.to_string(),
        })?
}
