//! Modification-time comparison between a source and a target entry

use std::cmp::Ordering;
use serde::{Deserialize, Serialize};

use crate::scanner::FileEntry;

/// Result of comparing one relative path across two roots
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ComparisonResult {
    /// Same modification time; treated as unchanged
    Identical,
    /// Source file is strictly newer than the target
    SourceNewer,
    /// Target file is newer than the source; left alone
    TargetNewer,
    /// Source file exists but target doesn't
    SourceOnly,
    /// Target file exists but source doesn't
    TargetOnly,
}

impl ComparisonResult {
    /// Whether the source copy has to be transferred to the target
    pub fn needs_transfer(self) -> bool {
        matches!(self, Self::SourceNewer | Self::SourceOnly)
    }
}

/// Compare two optional entries for the same relative path.
///
/// No rounding is applied: on filesystems that only keep whole seconds an edit
/// within the same second as the last sync is not detected.
pub fn compare_entries(source: Option<&FileEntry>, target: Option<&FileEntry>) -> Option<ComparisonResult> {
    match (source, target) {
        (Some(_), None) => Some(ComparisonResult::SourceOnly),
        (None, Some(_)) => Some(ComparisonResult::TargetOnly),
        (None, None) => None,
        (Some(source), Some(target)) => Some(match source.modified.cmp(&target.modified) {
            Ordering::Greater => ComparisonResult::SourceNewer,
            Ordering::Less => ComparisonResult::TargetNewer,
            Ordering::Equal => ComparisonResult::Identical,
        }),
    }
}
