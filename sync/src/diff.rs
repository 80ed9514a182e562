//! Change detection between a source root and a target root

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::comparator::{compare_entries, ComparisonResult};
use crate::error::{Result, RootRole};
use crate::filter::IgnorePolicy;
use crate::manifest::Manifest;
use crate::scanner::{DirectoryScanner, ScanIndex};

/// Direction of a sync call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    /// Network root to local root
    Down,
    /// Local root to network root
    Up,
}

impl SyncDirection {
    pub fn source_role(self) -> RootRole {
        match self {
            SyncDirection::Down => RootRole::Network,
            SyncDirection::Up => RootRole::Local,
        }
    }

    pub fn target_role(self) -> RootRole {
        match self {
            SyncDirection::Down => RootRole::Local,
            SyncDirection::Up => RootRole::Network,
        }
    }
}

impl std::fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncDirection::Down => write!(f, "down"),
            SyncDirection::Up => write!(f, "up"),
        }
    }
}

impl std::str::FromStr for SyncDirection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "down" => Ok(SyncDirection::Down),
            "up" => Ok(SyncDirection::Up),
            other => Err(format!("unknown sync direction '{}', expected 'up' or 'down'", other)),
        }
    }
}

/// Relative paths whose source copy must be transferred to the target.
///
/// A path is a member iff it exists in the source and not the target, or
/// exists in both and the source modification time is strictly greater.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    paths: BTreeSet<PathBuf>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn contains(&self, relative_path: &Path) -> bool {
        self.paths.contains(relative_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.paths.iter()
    }
}

impl FromIterator<PathBuf> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = PathBuf>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().collect(),
        }
    }
}

/// One step of a sync plan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SyncAction {
    /// File only exists in the source
    Copy { path: PathBuf, file_size: u64 },
    /// Source copy is newer than the target copy
    Update { path: PathBuf, file_size: u64 },
    /// File was synced before and has since been removed from the source
    Delete { path: PathBuf },
}

impl SyncAction {
    pub fn path(&self) -> &Path {
        match self {
            SyncAction::Copy { path, .. }
            | SyncAction::Update { path, .. }
            | SyncAction::Delete { path } => path,
        }
    }

    pub fn file_size(&self) -> u64 {
        match self {
            SyncAction::Copy { file_size, .. } | SyncAction::Update { file_size, .. } => *file_size,
            SyncAction::Delete { .. } => 0,
        }
    }
}

/// Summary of a sync plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub copies: usize,
    pub updates: usize,
    pub deletes: usize,
    /// Files present on both sides with equal modification times
    pub unchanged: usize,
    /// Files where the target copy is newer; never overwritten
    pub target_newer: usize,
    /// Target-only files that were never synced; left in place
    pub untracked: usize,
    pub total_bytes_to_transfer: u64,
}

/// A complete plan for one direction at one point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPlan {
    pub direction: SyncDirection,
    /// Deletions first, then copies and updates, each in relative-path order
    pub actions: Vec<SyncAction>,
    /// Files present in both roots when the plan was made
    pub shared: Vec<PathBuf>,
    pub summary: PlanSummary,
}

impl SyncPlan {
    /// Whether executing this plan would touch the target root
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Diff engine for building change sets and sync plans
#[derive(Debug, Clone)]
pub struct DiffEngine {
    scanner: DirectoryScanner,
}

impl DiffEngine {
    pub fn new(policy: IgnorePolicy) -> Self {
        Self {
            scanner: DirectoryScanner::new(policy),
        }
    }

    /// Compute the change set from `source_root` to `target_root`.
    ///
    /// A missing target root counts as empty, so every source file is a change.
    pub async fn detect_changes(
        &self,
        source_root: &Path,
        target_root: &Path,
        direction: SyncDirection,
    ) -> Result<ChangeSet> {
        let source = self.scanner.scan(source_root, direction.source_role()).await?;
        let target = self.scanner.scan_or_empty(target_root, direction.target_role()).await?;
        Ok(Self::change_set_from_indexes(&source, &target))
    }

    /// Scan both roots and build the plan for one direction
    pub async fn generate_plan(
        &self,
        source_root: &Path,
        target_root: &Path,
        direction: SyncDirection,
        baseline: &Manifest,
    ) -> Result<SyncPlan> {
        let source = self.scanner.scan(source_root, direction.source_role()).await?;
        let target = self.scanner.scan(target_root, direction.target_role()).await?;
        Ok(Self::plan_from_indexes(direction, &source, &target, baseline))
    }

    /// Change set from two already-scanned roots
    pub fn change_set_from_indexes(source: &ScanIndex, target: &ScanIndex) -> ChangeSet {
        source
            .files
            .values()
            .filter(|entry| {
                compare_entries(Some(*entry), target.get(&entry.relative_path))
                    .map(ComparisonResult::needs_transfer)
                    .unwrap_or(false)
            })
            .map(|entry| entry.relative_path.clone())
            .collect()
    }

    /// Plan from two already-scanned roots and the deletion baseline
    pub fn plan_from_indexes(
        direction: SyncDirection,
        source: &ScanIndex,
        target: &ScanIndex,
        baseline: &Manifest,
    ) -> SyncPlan {
        let mut actions = Vec::new();
        let mut shared = Vec::new();
        let mut summary = PlanSummary::default();

        for entry in source.files.values() {
            let target_entry = target.get(&entry.relative_path);
            if target_entry.is_some() {
                shared.push(entry.relative_path.clone());
            }

            match compare_entries(Some(entry), target_entry) {
                Some(ComparisonResult::SourceOnly) => {
                    summary.copies += 1;
                    summary.total_bytes_to_transfer += entry.size;
                    actions.push(SyncAction::Copy {
                        path: entry.relative_path.clone(),
                        file_size: entry.size,
                    });
                }
                Some(ComparisonResult::SourceNewer) => {
                    summary.updates += 1;
                    summary.total_bytes_to_transfer += entry.size;
                    actions.push(SyncAction::Update {
                        path: entry.relative_path.clone(),
                        file_size: entry.size,
                    });
                }
                Some(ComparisonResult::TargetNewer) => summary.target_newer += 1,
                _ => summary.unchanged += 1,
            }
        }

        for path in target.files.keys().filter(|path| !source.contains(path)) {
            if baseline.contains(path) {
                summary.deletes += 1;
                actions.push(SyncAction::Delete { path: path.clone() });
            } else {
                summary.untracked += 1;
            }
        }

        // Deleting first frees paths that switched between file and directory
        actions.sort_by(|a, b| {
            let a_delete = matches!(a, SyncAction::Delete { .. });
            let b_delete = matches!(b, SyncAction::Delete { .. });
            b_delete.cmp(&a_delete).then_with(|| a.path().cmp(b.path()))
        });

        SyncPlan {
            direction,
            actions,
            shared,
            summary,
        }
    }
}
