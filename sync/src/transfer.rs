//! Single-path transfer between two roots

use std::path::Path;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::preservation::AttributePreserver;

/// What `sync_one` did to the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferOutcome {
    /// Source bytes and modification time were written to the target
    Copied { bytes: u64 },
    /// Source was gone, so the target copy was deleted
    Removed,
    /// Neither root has the path
    Absent,
}

/// Copies or deletes individual relative paths between roots
#[derive(Debug, Clone, Default)]
pub struct FileTransfer {
    preserver: AttributePreserver,
}

impl FileTransfer {
    pub fn new(preserver: AttributePreserver) -> Self {
        Self { preserver }
    }

    /// Make `relative_path` under `target_root` match `source_root`.
    ///
    /// Existence is checked at call time, so a file that vanished from the
    /// source since the plan was made is deleted from the target. A source
    /// path that is now a directory, or whose parent is now a file, also
    /// counts as gone for the target file. Directories emptied by a deletion
    /// are removed unless the source still has them.
    pub async fn sync_one(
        &self,
        relative_path: &Path,
        source_root: &Path,
        target_root: &Path,
    ) -> Result<TransferOutcome> {
        let source = source_root.join(relative_path);
        let target = target_root.join(relative_path);

        match fs::metadata(&source).await {
            Ok(metadata) if metadata.is_file() => {
                self.copy_file(&source, &target).await?;
                debug!("Copied '{}' ({} bytes)", relative_path.display(), metadata.len());
                Ok(TransferOutcome::Copied { bytes: metadata.len() })
            }
            Ok(metadata) if metadata.is_dir() => {
                self.remove_stale(relative_path, source_root, target_root).await
            }
            Ok(_) => Err(SyncError::path_error(&source, "Source is not a regular file")),
            Err(e) if is_gone(&e) => self.remove_stale(relative_path, source_root, target_root).await,
            Err(e) => Err(SyncError::path_error(&source, format!("Failed to read metadata: {}", e))),
        }
    }

    /// Delete the target file for a path the source no longer has as a file
    async fn remove_stale(
        &self,
        relative_path: &Path,
        source_root: &Path,
        target_root: &Path,
    ) -> Result<TransferOutcome> {
        let target = target_root.join(relative_path);
        match fs::symlink_metadata(&target).await {
            Ok(metadata) if !metadata.is_dir() => {}
            _ => return Ok(TransferOutcome::Absent),
        }

        self.delete_file(&target).await?;
        debug!("Removed '{}'", relative_path.display());
        prune_empty_parents(relative_path, source_root, target_root).await;
        Ok(TransferOutcome::Removed)
    }

    /// Copy bytes and timestamps, creating parent directories
    async fn copy_file(&self, source: &Path, destination: &Path) -> Result<()> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                SyncError::copy_error(source, destination, format!("Failed to create parent directory: {}", e))
            })?;
        }

        // A read-only target left by an earlier copy must not block the update
        make_writable(destination)
            .await
            .map_err(|e| SyncError::copy_error(source, destination, format!("Failed to make target writable: {}", e)))?;

        fs::copy(source, destination).await.map_err(|e| {
            SyncError::copy_error(source, destination, format!("Failed to copy file: {}", e))
        })?;

        self.preserver.copy_attributes(source, destination).await
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        make_writable(path)
            .await
            .map_err(|e| SyncError::deletion_error(path, format!("Failed to make file writable: {}", e)))?;
        fs::remove_file(path).await.map_err(|e| {
            SyncError::deletion_error(path, format!("Failed to delete file: {}", e))
        })
    }
}

/// NotFound, or a parent component that turned into a file
fn is_gone(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
    )
}

/// Clear the read-only flag of an existing file; missing files are fine
async fn make_writable(path: &Path) -> std::io::Result<()> {
    let Ok(existing) = fs::metadata(path).await else {
        return Ok(());
    };
    let mut permissions = existing.permissions();
    if !permissions.readonly() {
        return Ok(());
    }
    #[allow(clippy::permissions_set_readonly_false)]
    permissions.set_readonly(false);
    fs::set_permissions(path, permissions).await
}

/// Remove now-empty target directories between `relative_path` and the root,
/// stopping at the first one the source still has or that is not empty
async fn prune_empty_parents(relative_path: &Path, source_root: &Path, target_root: &Path) {
    let mut current = relative_path.parent();
    while let Some(dir) = current {
        if dir.as_os_str().is_empty() {
            break;
        }
        let source_is_dir = fs::metadata(source_root.join(dir))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if source_is_dir || fs::remove_dir(target_root.join(dir)).await.is_err() {
            break;
        }
        debug!("Pruned empty directory '{}'", dir.display());
        current = dir.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use tempfile::TempDir;

    fn roots() -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source");
        let target = temp_dir.path().join("target");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::create_dir_all(&target).unwrap();
        (temp_dir, source, target)
    }

    #[tokio::test]
    async fn test_copy_creates_parents_and_keeps_mtime() {
        let (_temp, source, target) = roots();
        std::fs::create_dir_all(source.join("results/run1")).unwrap();
        std::fs::write(source.join("results/run1/output.txt"), b"done").unwrap();
        let stamp = FileTime::from_unix_time(1_700_000_000, 42);
        filetime::set_file_mtime(source.join("results/run1/output.txt"), stamp).unwrap();

        let outcome = FileTransfer::default()
            .sync_one(Path::new("results/run1/output.txt"), &source, &target)
            .await
            .unwrap();

        assert_eq!(outcome, TransferOutcome::Copied { bytes: 4 });
        let copied = target.join("results/run1/output.txt");
        assert_eq!(std::fs::read(&copied).unwrap(), b"done");
        let metadata = std::fs::metadata(&copied).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&metadata), stamp);
    }

    #[tokio::test]
    async fn test_missing_source_deletes_target() {
        let (_temp, source, target) = roots();
        std::fs::write(target.join("stale.txt"), b"old").unwrap();

        let outcome = FileTransfer::default()
            .sync_one(Path::new("stale.txt"), &source, &target)
            .await
            .unwrap();

        assert_eq!(outcome, TransferOutcome::Removed);
        assert!(!target.join("stale.txt").exists());
    }

    #[tokio::test]
    async fn test_absent_on_both_sides() {
        let (_temp, source, target) = roots();
        let outcome = FileTransfer::default()
            .sync_one(Path::new("nothing.txt"), &source, &target)
            .await
            .unwrap();
        assert_eq!(outcome, TransferOutcome::Absent);
    }

    #[tokio::test]
    async fn test_overwrites_read_only_target() {
        let (_temp, source, target) = roots();
        std::fs::write(source.join("locked.txt"), b"new").unwrap();
        std::fs::write(target.join("locked.txt"), b"old").unwrap();
        let mut permissions = std::fs::metadata(target.join("locked.txt")).unwrap().permissions();
        permissions.set_readonly(true);
        std::fs::set_permissions(target.join("locked.txt"), permissions).unwrap();

        FileTransfer::default()
            .sync_one(Path::new("locked.txt"), &source, &target)
            .await
            .unwrap();

        assert_eq!(std::fs::read(target.join("locked.txt")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_blocked_parent_is_copy_error() {
        let (_temp, source, target) = roots();
        std::fs::create_dir_all(source.join("a")).unwrap();
        std::fs::write(source.join("a/b.txt"), b"x").unwrap();
        std::fs::write(target.join("a"), b"a file where a directory should be").unwrap();

        let err = FileTransfer::default()
            .sync_one(Path::new("a/b.txt"), &source, &target)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::FileCopy { .. }));
    }

    #[tokio::test]
    async fn test_source_directory_replaces_target_file() {
        let (_temp, source, target) = roots();
        std::fs::create_dir_all(source.join("a")).unwrap();
        std::fs::write(source.join("a/b.txt"), b"x").unwrap();
        std::fs::write(target.join("a"), b"was a file").unwrap();

        let outcome = FileTransfer::default()
            .sync_one(Path::new("a"), &source, &target)
            .await
            .unwrap();
        assert_eq!(outcome, TransferOutcome::Removed);
        assert!(!target.join("a").exists());

        let outcome = FileTransfer::default()
            .sync_one(Path::new("a/b.txt"), &source, &target)
            .await
            .unwrap();
        assert_eq!(outcome, TransferOutcome::Copied { bytes: 1 });
    }

    #[tokio::test]
    async fn test_parent_turned_file_deletes_and_prunes() {
        let (_temp, source, target) = roots();
        std::fs::write(source.join("a"), b"now a file").unwrap();
        std::fs::create_dir_all(target.join("a")).unwrap();
        std::fs::write(target.join("a/b.txt"), b"old").unwrap();

        let outcome = FileTransfer::default()
            .sync_one(Path::new("a/b.txt"), &source, &target)
            .await
            .unwrap();

        assert_eq!(outcome, TransferOutcome::Removed);
        assert!(!target.join("a").exists());
    }

    #[tokio::test]
    async fn test_prune_keeps_directories_the_source_has() {
        let (_temp, source, target) = roots();
        std::fs::create_dir_all(source.join("results")).unwrap();
        std::fs::create_dir_all(target.join("results")).unwrap();
        std::fs::write(target.join("results/old.csv"), b"old").unwrap();

        FileTransfer::default()
            .sync_one(Path::new("results/old.csv"), &source, &target)
            .await
            .unwrap();

        assert!(target.join("results").is_dir());
    }

    #[tokio::test]
    async fn test_read_only_target_is_deleted() {
        let (_temp, source, target) = roots();
        std::fs::write(target.join("locked.txt"), b"old").unwrap();
        let mut permissions = std::fs::metadata(target.join("locked.txt")).unwrap().permissions();
        permissions.set_readonly(true);
        std::fs::set_permissions(target.join("locked.txt"), permissions).unwrap();

        let outcome = FileTransfer::default()
            .sync_one(Path::new("locked.txt"), &source, &target)
            .await
            .unwrap();

        assert_eq!(outcome, TransferOutcome::Removed);
        assert!(!target.join("locked.txt").exists());
    }
}
