//! Sync log side file recording the most recent sync operation
//!
//! Diagnostics only: nothing in the engine reads it back to make decisions.

use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::diff::SyncDirection;
use crate::error::{Result, SyncError};
use crate::filter::SYNC_LOG_FILE_NAME;
use crate::metrics::SyncMetrics;

/// Kind of sync call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    Initial,
    Incremental,
}

impl std::fmt::Display for SyncKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncKind::Initial => write!(f, "initial"),
            SyncKind::Incremental => write!(f, "incremental"),
        }
    }
}

/// Metadata describing one sync call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOperation {
    pub last_sync: DateTime<Utc>,
    pub operation: SyncKind,
    pub direction: SyncDirection,
    pub files_copied: usize,
    pub files_updated: usize,
    pub files_removed: usize,
    pub files_failed: usize,
    pub bytes_transferred: u64,
}

impl SyncOperation {
    pub fn from_metrics(kind: SyncKind, direction: SyncDirection, metrics: &SyncMetrics) -> Self {
        Self {
            last_sync: Utc::now(),
            operation: kind,
            direction,
            files_copied: metrics.files.copied,
            files_updated: metrics.files.updated,
            files_removed: metrics.files.removed,
            files_failed: metrics.files.failed,
            bytes_transferred: metrics.bytes_transferred,
        }
    }
}

/// Reader/writer for the log file inside a local root
pub struct SyncLog;

impl SyncLog {
    pub fn file_path(local_root: &Path) -> PathBuf {
        local_root.join(SYNC_LOG_FILE_NAME)
    }

    /// Overwrite the log with `operation`
    pub async fn write(local_root: &Path, operation: &SyncOperation) -> Result<()> {
        let path = Self::file_path(local_root);
        let content = serde_json::to_vec_pretty(operation)?;
        fs::write(&path, content)
            .await
            .map_err(|e| SyncError::path_error(&path, format!("Failed to write sync log: {}", e)))
    }

    /// Read the last recorded operation, if any
    pub async fn read(local_root: &Path) -> Result<Option<SyncOperation>> {
        let path = Self::file_path(local_root);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::path_error(&path, format!("Failed to read sync log: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_overwrites_previous_entry() {
        let temp_dir = TempDir::new().unwrap();
        let metrics = SyncMetrics::new();

        let first = SyncOperation::from_metrics(SyncKind::Initial, SyncDirection::Down, &metrics);
        SyncLog::write(temp_dir.path(), &first).await.unwrap();
        let second = SyncOperation::from_metrics(SyncKind::Incremental, SyncDirection::Up, &metrics);
        SyncLog::write(temp_dir.path(), &second).await.unwrap();

        let read = SyncLog::read(temp_dir.path()).await.unwrap().unwrap();
        assert_eq!(read, second);
    }

    #[tokio::test]
    async fn test_serialized_keys() {
        let temp_dir = TempDir::new().unwrap();
        let op = SyncOperation::from_metrics(SyncKind::Incremental, SyncDirection::Down, &SyncMetrics::new());
        SyncLog::write(temp_dir.path(), &op).await.unwrap();

        let raw = std::fs::read_to_string(SyncLog::file_path(temp_dir.path())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["operation"], "incremental");
        assert_eq!(value["direction"], "down");
        assert!(value["last_sync"].is_string());
    }

    #[tokio::test]
    async fn test_read_without_log() {
        let temp_dir = TempDir::new().unwrap();
        assert!(SyncLog::read(temp_dir.path()).await.unwrap().is_none());
    }
}
