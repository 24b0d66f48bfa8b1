//! Shared types for the printerd project.
//!
//! This library describes the on-disk layout of a print queue and the work
//! items discovered in it. The daemon and the behavioural tests both build on
//! these definitions so the layout contract lives in one place.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Extension (without the dot) that marks a queue entry as printable.
///
/// The comparison is case-sensitive: `report.PDF` is not a work item.
pub const PDF_EXTENSION: &str = "pdf";

/// Name of the archive subdirectory inside the queue directory.
pub const ARCHIVE_DIR_NAME: &str = "complete";

/// Name of the operational log file kept inside the queue directory.
pub const LOG_FILE_NAME: &str = "printer.log";

/// Paths derived from a watched queue directory.
///
/// ```
/// use printerd_lib::QueueLayout;
/// use std::path::Path;
///
/// let layout = QueueLayout::new("/srv/print");
/// assert_eq!(layout.archive_dir(), Path::new("/srv/print/complete"));
/// assert_eq!(layout.log_file(), Path::new("/srv/print/printer.log"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueLayout {
    queue_dir: PathBuf,
}

impl QueueLayout {
    /// Describe the layout rooted at `queue_dir`.
    pub fn new(queue_dir: impl Into<PathBuf>) -> Self {
        Self {
            queue_dir: queue_dir.into(),
        }
    }

    /// The watched directory holding pending `.pdf` files.
    pub fn queue_dir(&self) -> &Path {
        &self.queue_dir
    }

    /// The directory successfully processed files are moved into.
    pub fn archive_dir(&self) -> PathBuf {
        self.queue_dir.join(ARCHIVE_DIR_NAME)
    }

    /// The append-only operational log file.
    pub fn log_file(&self) -> PathBuf {
        self.queue_dir.join(LOG_FILE_NAME)
    }

    /// Destination of `item` once archived. The file name is preserved.
    pub fn archive_path_for(&self, item: &WorkItem) -> PathBuf {
        self.archive_dir().join(&item.file_name)
    }
}

/// One printable file discovered during a scan.
///
/// Work items live for a single cycle; the queue directory itself is the
/// durable backlog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Absolute (or queue-relative, as given) path of the source file.
    pub path: PathBuf,
    /// File name as it appears in the queue directory.
    pub file_name: OsString,
    /// Extension of the file, always [`PDF_EXTENSION`].
    pub extension: String,
}

impl WorkItem {
    /// Build a work item from `path` if its extension is exactly
    /// [`PDF_EXTENSION`].
    ///
    /// Entry type is not inspected here; callers must exclude directories.
    ///
    /// ```
    /// use printerd_lib::WorkItem;
    ///
    /// assert!(WorkItem::from_path("/q/a.pdf").is_some());
    /// assert!(WorkItem::from_path("/q/a.PDF").is_none());
    /// assert!(WorkItem::from_path("/q/b.txt").is_none());
    /// ```
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        if !has_pdf_extension(&path) {
            return None;
        }
        let file_name = path.file_name()?.to_os_string();
        Some(Self {
            path,
            file_name,
            extension: PDF_EXTENSION.to_owned(),
        })
    }

    /// File name rendered for log output.
    pub fn display_name(&self) -> std::borrow::Cow<'_, str> {
        self.file_name.to_string_lossy()
    }
}

/// Returns whether `path` ends in `.pdf`, compared case-sensitively.
pub fn has_pdf_extension(path: &Path) -> bool {
    path.extension() == Some(OsStr::new(PDF_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_item_for_pdf() {
        let item = WorkItem::from_path("/queue/a.pdf")
            .unwrap_or_else(|| panic!("a.pdf should be a work item"));
        assert_eq!(item.file_name, OsString::from("a.pdf"));
        assert_eq!(item.extension, "pdf");
        assert_eq!(item.display_name(), "a.pdf");
    }

    #[test]
    fn rejects_other_extensions() {
        for name in ["b.txt", "c.PDF", "d.pdf.part", "noext", ".pdf", "printer.log"] {
            assert!(
                WorkItem::from_path(Path::new("/queue").join(name)).is_none(),
                "{name} should not be a work item"
            );
        }
    }

    #[test]
    fn archive_path_keeps_file_name() {
        let layout = QueueLayout::new("/queue");
        let item = WorkItem::from_path("/queue/report 1.pdf")
            .unwrap_or_else(|| panic!("pdf should be a work item"));
        assert_eq!(
            layout.archive_path_for(&item),
            PathBuf::from("/queue/complete/report 1.pdf")
        );
    }
}
