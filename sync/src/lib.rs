//! Smart Sync
//!
//! Incremental mirroring of a project directory between a network location
//! and a local staging directory, driven from a step-based workflow:
//! - Ignore policy for caches, OS metadata and the engine's own files
//! - Modification-time change detection with baseline-gated deletions
//! - Single-file transfer preserving timestamps
//! - Initial, sync-down and sync-up operations
//! - Pre/post-step hooks with timeouts and warn-and-continue failures

pub mod scanner;
pub mod comparator;
pub mod diff;
pub mod filter;
pub mod transfer;
pub mod preservation;
pub mod manifest;
pub mod sync_log;
pub mod sync_engine;
pub mod hooks;
pub mod scenario;
pub mod config;
pub mod metrics;
pub mod error;

// Re-export main types and functions
pub use scanner::{DirectoryScanner, FileEntry, ScanIndex};
pub use comparator::ComparisonResult;
pub use diff::{ChangeSet, DiffEngine, SyncAction, SyncDirection, SyncPlan};
pub use filter::IgnorePolicy;
pub use transfer::{FileTransfer, TransferOutcome};
pub use manifest::Manifest;
pub use sync_log::{SyncKind, SyncLog, SyncOperation};
pub use sync_engine::{SmartSyncManager, SyncOutcome};
pub use hooks::{run_step, HookOutcome, StepStatus, SyncHooks};
pub use scenario::{HostOs, Scenario};
pub use config::SmartSyncConfig;
pub use metrics::{FileStats, SyncMetrics};
pub use error::{Result, RootRole, SyncError};

/// Check whether a relative path is excluded by the reserved ignore set
pub fn should_ignore(relative_path: impl AsRef<std::path::Path>) -> bool {
    IgnorePolicy::default().should_ignore(relative_path.as_ref())
}

/// Compute the change set from `source_root` to `target_root` with the reserved ignore set.
///
/// Scan errors name the source as the network root and the target as the
/// local root, as for a sync-down. A missing target root counts as empty, so
/// every source file is reported; use [`DiffEngine::detect_changes`] to pick
/// the direction explicitly.
pub async fn detect_changes(
    source_root: impl AsRef<std::path::Path>,
    target_root: impl AsRef<std::path::Path>,
) -> Result<ChangeSet> {
    DiffEngine::new(IgnorePolicy::default())
        .detect_changes(source_root.as_ref(), target_root.as_ref(), SyncDirection::Down)
        .await
}

/// Copy or delete one relative path so the target matches the source
pub async fn sync_one(
    relative_path: impl AsRef<std::path::Path>,
    source_root: impl AsRef<std::path::Path>,
    target_root: impl AsRef<std::path::Path>,
) -> Result<TransferOutcome> {
    FileTransfer::default()
        .sync_one(relative_path.as_ref(), source_root.as_ref(), target_root.as_ref())
        .await
}

// Test modules
#[cfg(test)]
mod diff_tests;
