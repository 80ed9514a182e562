//! Modification-time and permission preservation for copied files

use std::path::Path;
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{Result, SyncError};

/// Options for attribute preservation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreservationOptions {
    /// Preserve file modification times; change detection depends on this
    pub preserve_mtime: bool,
    /// Preserve the read-only / mode bits
    pub preserve_permissions: bool,
}

impl Default for PreservationOptions {
    fn default() -> Self {
        Self {
            preserve_mtime: true,
            preserve_permissions: true,
        }
    }
}

/// Attribute preserver for maintaining file metadata across roots
#[derive(Debug, Clone, Default)]
pub struct AttributePreserver {
    options: PreservationOptions,
}

impl AttributePreserver {
    pub fn new(options: PreservationOptions) -> Self {
        Self { options }
    }

    /// Copy attributes from source to destination.
    ///
    /// Times are written before permissions; setting times on Windows needs
    /// write access to the destination.
    pub async fn copy_attributes(&self, source: &Path, destination: &Path) -> Result<()> {
        let metadata = fs::metadata(source).await.map_err(|e| {
            SyncError::attribute_error(source, format!("Failed to read metadata: {}", e))
        })?;

        if self.options.preserve_mtime {
            let mtime = FileTime::from_last_modification_time(&metadata);
            let destination_owned = destination.to_path_buf();

            tokio::task::spawn_blocking(move || filetime::set_file_mtime(&destination_owned, mtime))
                .await
                .map_err(|e| SyncError::attribute_error(destination, format!("Timestamp task failed: {}", e)))?
                .map_err(|e| SyncError::attribute_error(destination, format!("Failed to set file times: {}", e)))?;
        }

        if self.options.preserve_permissions {
            fs::set_permissions(destination, metadata.permissions())
                .await
                .map_err(|e| {
                    SyncError::attribute_error(destination, format!("Failed to set permissions: {}", e))
                })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_mtime_is_copied_exactly() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source.txt");
        let destination = temp_dir.path().join("destination.txt");

        fs::write(&source, b"source").await.unwrap();
        fs::write(&destination, b"destination").await.unwrap();

        let stamp = FileTime::from_unix_time(1_600_000_000, 123_456_000);
        filetime::set_file_mtime(&source, stamp).unwrap();

        AttributePreserver::default()
            .copy_attributes(&source, &destination)
            .await
            .unwrap();

        let copied = std::fs::metadata(&destination).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&copied), stamp);
    }

    #[tokio::test]
    async fn test_missing_source_is_attribute_error() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("destination.txt");
        fs::write(&destination, b"x").await.unwrap();

        let err = AttributePreserver::default()
            .copy_attributes(&temp_dir.path().join("missing"), &destination)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::AttributePreservation { .. }));
    }

    #[tokio::test]
    async fn test_read_only_source_keeps_mtime_and_mode() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source.txt");
        let destination = temp_dir.path().join("destination.txt");

        fs::write(&source, b"source").await.unwrap();
        fs::write(&destination, b"source").await.unwrap();
        let stamp = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&source, stamp).unwrap();
        let mut permissions = std::fs::metadata(&source).unwrap().permissions();
        permissions.set_readonly(true);
        std::fs::set_permissions(&source, permissions).unwrap();

        AttributePreserver::default()
            .copy_attributes(&source, &destination)
            .await
            .unwrap();

        let copied = std::fs::metadata(&destination).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&copied), stamp);
        assert!(copied.permissions().readonly());
    }

    #[tokio::test]
    async fn test_permissions_can_be_left_alone() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source.txt");
        let destination = temp_dir.path().join("destination.txt");

        fs::write(&source, b"source").await.unwrap();
        fs::write(&destination, b"source").await.unwrap();
        let mut permissions = std::fs::metadata(&source).unwrap().permissions();
        permissions.set_readonly(true);
        std::fs::set_permissions(&source, permissions).unwrap();

        let preserver = AttributePreserver::new(PreservationOptions {
            preserve_mtime: true,
            preserve_permissions: false,
        });
        preserver.copy_attributes(&source, &destination).await.unwrap();

        assert!(!std::fs::metadata(&destination).unwrap().permissions().readonly());
    }
}
