//! SmartSyncManager: initial and incremental mirroring between a network root
//! and a local staging root

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::SmartSyncConfig;
use crate::diff::{ChangeSet, DiffEngine, SyncAction, SyncDirection, SyncPlan};
use crate::error::{Result, RootRole, SyncError};
use crate::filter::IgnorePolicy;
use crate::manifest::Manifest;
use crate::metrics::SyncMetrics;
use crate::preservation::{AttributePreserver, PreservationOptions};
use crate::scanner::{check_root, DirectoryScanner};
use crate::sync_log::{SyncKind, SyncLog, SyncOperation};
use crate::transfer::{FileTransfer, TransferOutcome};

/// Result of one successful sync call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub kind: SyncKind,
    pub direction: SyncDirection,
    /// Paths the plan asked to transfer or delete
    pub changes_detected: usize,
    pub metrics: SyncMetrics,
}

impl SyncOutcome {
    /// Whether the call found anything to move
    pub fn has_changes(&self) -> bool {
        self.changes_detected > 0
    }
}

/// Mirrors one network/local root pair.
///
/// Incremental calls assume `initial_sync` has populated the local root at
/// least once; the manager does not enforce this.
pub struct SmartSyncManager {
    network_root: PathBuf,
    local_root: PathBuf,
    scanner: DirectoryScanner,
    diff_engine: DiffEngine,
    transfer: FileTransfer,
    baseline: Option<Manifest>,
}

impl SmartSyncManager {
    /// Create a manager with the reserved ignore policy
    pub fn new(network_root: impl Into<PathBuf>, local_root: impl Into<PathBuf>) -> Self {
        Self::with_policy(network_root, local_root, IgnorePolicy::default())
    }

    pub fn with_policy(
        network_root: impl Into<PathBuf>,
        local_root: impl Into<PathBuf>,
        policy: IgnorePolicy,
    ) -> Self {
        Self {
            network_root: network_root.into(),
            local_root: local_root.into(),
            scanner: DirectoryScanner::new(policy.clone()),
            diff_engine: DiffEngine::new(policy),
            transfer: FileTransfer::new(AttributePreserver::new(PreservationOptions::default())),
            baseline: None,
        }
    }

    pub fn from_config(config: &SmartSyncConfig) -> Result<Self> {
        config.validate()?;
        let policy = IgnorePolicy::with_extra_patterns(&config.extra_ignore_patterns)?;
        Ok(Self::with_policy(&config.network_root, &config.local_root, policy))
    }

    pub fn network_root(&self) -> &Path {
        &self.network_root
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    /// Whether the local root carries a manifest from a completed initial sync
    pub async fn is_initialized(&self) -> bool {
        Manifest::exists(&self.local_root).await
    }

    /// Populate the local root from the network root.
    ///
    /// Directories are created first, then files are copied with their
    /// modification times. Nothing is deleted from the local root.
    pub async fn initial_sync(&mut self) -> Result<SyncOutcome> {
        let mut metrics = SyncMetrics::new();
        metrics.start();

        info!(
            "Starting initial sync from '{}' to '{}'",
            self.network_root.display(),
            self.local_root.display()
        );

        fs::create_dir_all(&self.local_root).await.map_err(|e| {
            SyncError::root_unavailable(RootRole::Local, &self.local_root, format!("Failed to create local root: {}", e))
        })?;

        let source = self.scanner.scan(&self.network_root, RootRole::Network).await?;
        let existing = self.scanner.scan_or_empty(&self.local_root, RootRole::Local).await?;
        metrics.files.scanned = source.len();

        for dir in &source.directories {
            let target = self.local_root.join(dir);
            if fs::metadata(&target).await.map(|m| m.is_dir()).unwrap_or(false) {
                continue;
            }
            match fs::create_dir_all(&target).await {
                Ok(()) => metrics.files.directories_created += 1,
                Err(e) => {
                    warn!("[initial] Failed to create directory '{}': {}", dir.display(), e);
                    metrics.record_error(format!("{}: {}", dir.display(), e));
                }
            }
        }

        let mut baseline = Manifest::new();
        let mut changes_detected = 0;

        for (relative_path, entry) in &source.files {
            if let Some(local) = existing.get(relative_path) {
                if local.modified == entry.modified && local.size == entry.size {
                    metrics.files.skipped += 1;
                    baseline.insert(relative_path);
                    continue;
                }
            }

            changes_detected += 1;
            match self
                .transfer
                .sync_one(relative_path, &self.network_root, &self.local_root)
                .await
            {
                Ok(outcome) => {
                    metrics.record_transfer(outcome, existing.contains(relative_path));
                    if matches!(outcome, TransferOutcome::Copied { .. }) {
                        baseline.insert(relative_path);
                    }
                }
                Err(e) => {
                    warn!("[initial down] Skipping '{}': {}", relative_path.display(), e);
                    metrics.record_error(format!("{}: {}", relative_path.display(), e));
                }
            }
        }

        self.fail_if_root_lost(&metrics, SyncDirection::Down).await?;

        baseline.save(&self.local_root).await?;
        self.baseline = Some(baseline);

        metrics.complete();
        self.record(SyncKind::Initial, SyncDirection::Down, &metrics).await;
        info!("Initial sync complete: {}", metrics.summary());

        Ok(SyncOutcome {
            kind: SyncKind::Initial,
            direction: SyncDirection::Down,
            changes_detected,
            metrics,
        })
    }

    /// Pull changes made on the network root into the local root
    pub async fn incremental_sync_down(&mut self) -> Result<SyncOutcome> {
        self.incremental(SyncDirection::Down).await
    }

    /// Push changes made in the local root back to the network root
    pub async fn incremental_sync_up(&mut self) -> Result<SyncOutcome> {
        self.incremental(SyncDirection::Up).await
    }

    /// Change set for one direction, without touching either root
    pub async fn detect_changes(&self, direction: SyncDirection) -> Result<ChangeSet> {
        let (source, target) = self.roots(direction);
        self.diff_engine.detect_changes(source, target, direction).await
    }

    /// Plan the next incremental sync in one direction without executing it
    pub async fn preview(&mut self, direction: SyncDirection) -> Result<SyncPlan> {
        let baseline = self.load_baseline().await.clone();
        let (source, target) = self.roots(direction);
        self.diff_engine.generate_plan(source, target, direction, &baseline).await
    }

    async fn incremental(&mut self, direction: SyncDirection) -> Result<SyncOutcome> {
        let mut metrics = SyncMetrics::new();
        metrics.start();

        let mut baseline = self.load_baseline().await.clone();
        let (source_root, target_root) = {
            let (s, t) = self.roots(direction);
            (s.to_path_buf(), t.to_path_buf())
        };

        let plan = self
            .diff_engine
            .generate_plan(&source_root, &target_root, direction, &baseline)
            .await?;
        metrics.files.scanned = plan.summary.copies
            + plan.summary.updates
            + plan.summary.unchanged
            + plan.summary.target_newer;

        let mut baseline_changed = false;
        for path in &plan.shared {
            baseline_changed |= baseline.insert(path);
        }

        if plan.is_empty() {
            debug!("[{}] No changes between '{}' and '{}'", direction, source_root.display(), target_root.display());
            if baseline_changed {
                self.store_baseline(baseline).await;
            }
            metrics.complete();
            return Ok(SyncOutcome {
                kind: SyncKind::Incremental,
                direction,
                changes_detected: 0,
                metrics,
            });
        }

        info!(
            "[{}] Syncing {} change(s): {} new, {} updated, {} deleted",
            direction,
            plan.actions.len(),
            plan.summary.copies,
            plan.summary.updates,
            plan.summary.deletes
        );

        for action in &plan.actions {
            let path = action.path();
            match self.transfer.sync_one(path, &source_root, &target_root).await {
                Ok(outcome) => {
                    metrics.record_transfer(outcome, matches!(action, SyncAction::Update { .. }));
                    match outcome {
                        TransferOutcome::Copied { .. } => {
                            baseline.insert(path);
                        }
                        TransferOutcome::Removed | TransferOutcome::Absent => {
                            baseline.remove(path);
                        }
                    }
                }
                Err(e) => {
                    warn!("[{}] Skipping '{}': {}", direction, path.display(), e);
                    metrics.record_error(format!("{}: {}", path.display(), e));
                }
            }
        }

        self.fail_if_root_lost(&metrics, direction).await?;
        self.store_baseline(baseline).await;

        metrics.complete();
        self.record(SyncKind::Incremental, direction, &metrics).await;
        info!("[{}] Incremental sync complete: {}", direction, metrics.summary());

        Ok(SyncOutcome {
            kind: SyncKind::Incremental,
            direction,
            changes_detected: plan.actions.len(),
            metrics,
        })
    }

    /// (source, target) for a direction
    fn roots(&self, direction: SyncDirection) -> (&Path, &Path) {
        match direction {
            SyncDirection::Down => (&self.network_root, &self.local_root),
            SyncDirection::Up => (&self.local_root, &self.network_root),
        }
    }

    /// Cached baseline; an unreadable manifest degrades to an empty one,
    /// which only disables deletion propagation
    async fn load_baseline(&mut self) -> &Manifest {
        if self.baseline.is_none() {
            let manifest = match Manifest::load(&self.local_root).await {
                Ok(manifest) => manifest,
                Err(e) => {
                    warn!("Ignoring unreadable sync manifest: {}", e);
                    Manifest::new()
                }
            };
            self.baseline = Some(manifest);
        }
        self.baseline.get_or_insert_with(Manifest::new)
    }

    async fn store_baseline(&mut self, baseline: Manifest) {
        if let Err(e) = baseline.save(&self.local_root).await {
            warn!("Failed to persist sync manifest: {}", e);
        }
        self.baseline = Some(baseline);
    }

    /// Turn per-file failures into a whole-operation failure when a root vanished mid-sync
    async fn fail_if_root_lost(&self, metrics: &SyncMetrics, direction: SyncDirection) -> Result<()> {
        if metrics.is_successful() {
            return Ok(());
        }
        let (source, target) = self.roots(direction);
        check_root(source, direction.source_role()).await?;
        check_root(target, direction.target_role()).await
    }

    async fn record(&self, kind: SyncKind, direction: SyncDirection, metrics: &SyncMetrics) {
        let operation = SyncOperation::from_metrics(kind, direction, metrics);
        if let Err(e) = SyncLog::write(&self.local_root, &operation).await {
            warn!("Failed to write sync log: {}", e);
        }
    }
}
