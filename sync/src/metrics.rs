//! Metrics and statistics for sync operations

use std::time::{Duration, Instant, SystemTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::transfer::TransferOutcome;

/// Counters for one sync call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncMetrics {
    /// Unique identifier for this sync call
    pub session_id: Uuid,
    /// Wall-clock start of the call
    pub start_time: SystemTime,
    /// Total duration of the call
    pub duration: Duration,
    /// File statistics
    pub files: FileStats,
    /// Total bytes written to the target root
    pub bytes_transferred: u64,
    /// Per-file failures that were skipped
    pub errors: Vec<String>,
    #[serde(skip)]
    started: Option<Instant>,
}

/// File-related statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileStats {
    /// Files seen in the source root
    pub scanned: usize,
    /// Files written to the target for the first time
    pub copied: usize,
    /// Files overwritten with a newer source copy
    pub updated: usize,
    /// Files deleted from the target
    pub removed: usize,
    /// Files skipped because both copies were identical
    pub skipped: usize,
    /// Directories created in the target
    pub directories_created: usize,
    /// Files that failed to transfer
    pub failed: usize,
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            start_time: SystemTime::now(),
            duration: Duration::default(),
            files: FileStats::default(),
            bytes_transferred: 0,
            errors: Vec::new(),
            started: None,
        }
    }

    /// Mark the start of the call
    pub fn start(&mut self) {
        self.start_time = SystemTime::now();
        self.started = Some(Instant::now());
    }

    /// Mark the end of the call
    pub fn complete(&mut self) {
        if let Some(started) = self.started {
            self.duration = started.elapsed();
        }
    }

    /// Record a successful transfer; `is_update` separates overwrites from first copies
    pub fn record_transfer(&mut self, outcome: TransferOutcome, is_update: bool) {
        match outcome {
            TransferOutcome::Copied { bytes } => {
                if is_update {
                    self.files.updated += 1;
                } else {
                    self.files.copied += 1;
                }
                self.bytes_transferred += bytes;
            }
            TransferOutcome::Removed => self.files.removed += 1,
            TransferOutcome::Absent => self.files.skipped += 1,
        }
    }

    /// Record a per-file failure that did not stop the call
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.files.failed += 1;
        self.errors.push(message.into());
    }

    /// Whether every attempted transfer succeeded
    pub fn is_successful(&self) -> bool {
        self.files.failed == 0
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        format!(
            "{} copied, {} updated, {} removed, {} failed, {} bytes in {:.2}s",
            self.files.copied,
            self.files.updated,
            self.files.removed,
            self.files.failed,
            self.bytes_transferred,
            self.duration.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_transfer_counts() {
        let mut metrics = SyncMetrics::new();
        metrics.record_transfer(TransferOutcome::Copied { bytes: 10 }, false);
        metrics.record_transfer(TransferOutcome::Copied { bytes: 5 }, true);
        metrics.record_transfer(TransferOutcome::Removed, false);
        metrics.record_transfer(TransferOutcome::Absent, false);

        assert_eq!(metrics.files.copied, 1);
        assert_eq!(metrics.files.updated, 1);
        assert_eq!(metrics.files.removed, 1);
        assert_eq!(metrics.files.skipped, 1);
        assert_eq!(metrics.bytes_transferred, 15);
        assert!(metrics.is_successful());
    }

    #[test]
    fn test_record_error() {
        let mut metrics = SyncMetrics::new();
        metrics.record_error("a/b.txt: permission denied");
        assert!(!metrics.is_successful());
        assert_eq!(metrics.errors.len(), 1);
        assert!(metrics.summary().contains("1 failed"));
    }
}
