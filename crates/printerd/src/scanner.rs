//! Queue scanner.
//!
//! Lists the queue directory once per cycle and returns the `.pdf` files in
//! it, sorted by file name.

use printerd_lib::{WorkItem, has_pdf_extension};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// The queue directory could not be listed.
#[derive(Debug, Error)]
#[error("failed to read queue directory {path}: {source}")]
pub struct ScanError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Return the work items currently waiting in `queue_dir`.
///
/// Only regular files whose extension is exactly `pdf` qualify, so the
/// `complete/` archive and a directory that happens to be called `foo.pdf`
/// are both skipped. Entries that disappear between listing and inspection
/// are ignored. Results are sorted by file name so that processing order does
/// not depend on the platform's enumeration order.
///
/// # Errors
///
/// Returns [`ScanError`] if the directory itself cannot be read.
pub async fn scan(queue_dir: &Path) -> Result<Vec<WorkItem>, ScanError> {
    let read_error = |source| ScanError {
        path: queue_dir.to_path_buf(),
        source,
    };
    let mut entries = fs::read_dir(queue_dir).await.map_err(read_error)?;
    let mut items = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(read_error)? {
        let path = entry.path();
        if !has_pdf_extension(&path) {
            continue;
        }
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                tracing::debug!(file = %path.display(), "Skipping non-file entry");
                continue;
            }
            Err(e) => {
                tracing::debug!(file = %path.display(), error = %e, "Entry vanished during scan");
                continue;
            }
        }
        if let Some(item) = WorkItem::from_path(path) {
            items.push(item);
        }
    }

    items.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(items)
}
