//! Archive mover.
//!
//! Relocates processed files into the `complete/` subdirectory of the queue,
//! keeping their file names.

use printerd_lib::{QueueLayout, WorkItem};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors raised while archiving a processed file.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to create archive directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Create the archive directory if it does not exist yet.
///
/// Calling this when the directory is already present is a no-op.
///
/// # Errors
///
/// Returns [`ArchiveError::CreateDir`] if the directory cannot be created,
/// for example because a regular file occupies the path.
pub async fn ensure_archive_dir(dir: &Path) -> Result<(), ArchiveError> {
    fs::create_dir_all(dir)
        .await
        .map_err(|source| ArchiveError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })
}

/// Move `item` into the archive directory of `layout`.
///
/// The archive directory is created on first use. An archived file with the
/// same name is replaced.
///
/// # Errors
///
/// Returns [`ArchiveError`] if the directory cannot be created or the rename
/// fails. The source file is left where it was in both cases.
pub async fn archive(item: &WorkItem, layout: &QueueLayout) -> Result<PathBuf, ArchiveError> {
    ensure_archive_dir(&layout.archive_dir()).await?;
    let dest = layout.archive_path_for(item);
    fs::rename(&item.path, &dest)
        .await
        .map_err(|source| ArchiveError::Move {
            from: item.path.clone(),
            to: dest.clone(),
            source,
        })?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::fs as stdfs;
    use tempfile::{TempDir, tempdir};

    struct Queue {
        dir: TempDir,
        layout: QueueLayout,
    }

    impl Queue {
        fn item(&self, name: &str, body: &[u8]) -> WorkItem {
            let path = self.dir.path().join(name);
            stdfs::write(&path, body).expect("write");
            WorkItem::from_path(path).expect("pdf work item")
        }
    }

    #[fixture]
    fn queue() -> Queue {
        let dir = tempdir().expect("tempdir");
        let layout = QueueLayout::new(dir.path());
        Queue { dir, layout }
    }

    #[rstest]
    #[tokio::test]
    async fn creates_archive_dir_lazily(queue: Queue) {
        let item = queue.item("a.pdf", b"%PDF");
        assert!(!queue.layout.archive_dir().exists());

        let dest = archive(&item, &queue.layout).await.expect("archive");

        assert_eq!(dest, queue.layout.archive_dir().join("a.pdf"));
        assert!(dest.is_file());
        assert!(!item.path.exists());
    }

    #[rstest]
    #[tokio::test]
    async fn ensure_archive_dir_is_idempotent(queue: Queue) {
        let dir = queue.layout.archive_dir();
        ensure_archive_dir(&dir).await.expect("first");
        ensure_archive_dir(&dir).await.expect("second");
        assert!(dir.is_dir());
    }

    #[rstest]
    #[tokio::test]
    async fn replaces_previously_archived_file(queue: Queue) {
        let first = queue.item("a.pdf", b"first");
        archive(&first, &queue.layout).await.expect("archive first");
        let second = queue.item("a.pdf", b"second");

        let dest = archive(&second, &queue.layout).await.expect("archive second");

        assert_eq!(stdfs::read(dest).expect("read"), b"second");
    }

    #[rstest]
    #[tokio::test]
    async fn missing_source_reports_move_error(queue: Queue) {
        let item = queue.item("a.pdf", b"%PDF");
        stdfs::remove_file(&item.path).expect("remove");

        let err = archive(&item, &queue.layout).await.expect_err("source is gone");
        assert!(matches!(err, ArchiveError::Move { .. }));
    }

    #[rstest]
    #[tokio::test]
    async fn file_blocking_archive_dir_reports_error(queue: Queue) {
        stdfs::write(queue.layout.archive_dir(), b"not a dir").expect("write");
        let item = queue.item("a.pdf", b"%PDF");

        let err = archive(&item, &queue.layout).await.expect_err("archive dir blocked");
        assert!(matches!(err, ArchiveError::CreateDir { .. }));
        assert!(item.path.exists(), "source must stay in the queue");
    }
}
