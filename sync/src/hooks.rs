//! Workflow step hooks
//!
//! The step engine calls `before_step` right before a step's script starts and
//! `after_step` once the step is known to have succeeded. Every failure,
//! including a timeout, ends here as a printed warning; the step itself is
//! never blocked or marked failed because of sync.

use std::future::Future;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SmartSyncConfig;
use crate::diff::SyncDirection;
use crate::error::{Result, SyncError};
use crate::sync_engine::SmartSyncManager;

/// What a hook invocation did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HookOutcome {
    /// Smart Sync is not enabled; nothing was attempted
    Disabled,
    /// Sync ran and found nothing to move
    NoChanges,
    /// Sync moved this many paths
    Synced(usize),
    /// Sync failed or timed out; the workflow continues
    Failed(String),
}

impl HookOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, HookOutcome::Failed(_))
    }
}

/// Anything a step can report that says whether it succeeded
pub trait StepStatus {
    fn succeeded(&self) -> bool;
}

impl StepStatus for bool {
    fn succeeded(&self) -> bool {
        *self
    }
}

impl<T, E> StepStatus for std::result::Result<T, E> {
    fn succeeded(&self) -> bool {
        self.is_ok()
    }
}

impl StepStatus for std::process::ExitStatus {
    fn succeeded(&self) -> bool {
        self.success()
    }
}

/// Pre/post-step sync calls guarded by the enablement flag
pub struct SyncHooks {
    manager: Option<SmartSyncManager>,
    pre_step_timeout: Duration,
    post_step_timeout: Duration,
}

impl SyncHooks {
    /// Hooks that never touch the filesystem
    pub fn disabled() -> Self {
        Self {
            manager: None,
            pre_step_timeout: Duration::ZERO,
            post_step_timeout: Duration::ZERO,
        }
    }

    pub fn new(manager: SmartSyncManager, pre_step_timeout: Duration, post_step_timeout: Duration) -> Self {
        Self {
            manager: Some(manager),
            pre_step_timeout,
            post_step_timeout,
        }
    }

    /// Enabled hooks for an enabled config, disabled hooks otherwise
    pub fn from_config(config: &SmartSyncConfig) -> Result<Self> {
        if !config.enabled {
            return Ok(Self::disabled());
        }
        let manager = SmartSyncManager::from_config(config)?;
        Ok(Self::new(manager, config.pre_step_timeout, config.post_step_timeout))
    }

    pub fn is_enabled(&self) -> bool {
        self.manager.is_some()
    }

    pub fn manager(&self) -> Option<&SmartSyncManager> {
        self.manager.as_ref()
    }

    /// Pull out-of-band network edits before a step runs
    pub async fn before_step(&mut self, step: &str) -> HookOutcome {
        let limit = self.pre_step_timeout;
        let outcome = self.bounded(SyncDirection::Down, limit).await;
        if let HookOutcome::Failed(message) = &outcome {
            report_warning(step, SyncDirection::Down, message, "continuing with local data");
        }
        outcome
    }

    /// Persist a successful step's outputs to the network root
    pub async fn after_step(&mut self, step: &str) -> HookOutcome {
        let limit = self.post_step_timeout;
        let outcome = self.bounded(SyncDirection::Up, limit).await;
        if let HookOutcome::Failed(message) = &outcome {
            report_warning(step, SyncDirection::Up, message, "step stays complete locally, resync later");
        }
        outcome
    }

    /// Best-effort sync-up on shutdown or cancellation
    pub async fn final_sync(&mut self) -> HookOutcome {
        let limit = self.post_step_timeout;
        let outcome = self.bounded(SyncDirection::Up, limit).await;
        if let HookOutcome::Failed(message) = &outcome {
            report_warning("shutdown", SyncDirection::Up, message, "local data left in place");
        }
        outcome
    }

    async fn bounded(&mut self, direction: SyncDirection, limit: Duration) -> HookOutcome {
        let Some(manager) = self.manager.as_mut() else {
            return HookOutcome::Disabled;
        };

        let sync = async {
            match direction {
                SyncDirection::Down => manager.incremental_sync_down().await,
                SyncDirection::Up => manager.incremental_sync_up().await,
            }
        };

        let result = match tokio::time::timeout(limit, sync).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::timeout(format!("sync-{}", direction), limit)),
        };

        match result {
            Ok(outcome) if outcome.has_changes() => {
                info!("[{}] Synced {} path(s)", direction, outcome.changes_detected);
                HookOutcome::Synced(outcome.changes_detected)
            }
            Ok(_) => {
                debug!("[{}] Nothing to sync", direction);
                HookOutcome::NoChanges
            }
            Err(e) => HookOutcome::Failed(e.to_string()),
        }
    }
}

fn report_warning(step: &str, direction: SyncDirection, message: &str, consequence: &str) {
    warn!(step, %direction, "Smart Sync failed: {}; {}", message, consequence);
    eprintln!("Warning: sync-{} for step '{}' failed: {} ({})", direction, step, message, consequence);
}

/// Run one workflow step between the pre-step and post-step hooks.
///
/// The step's own result is returned untouched; the post-step hook only runs
/// when the step reports success.
pub async fn run_step<F, Fut, T>(hooks: &mut SyncHooks, step: &str, step_fn: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
    T: StepStatus,
{
    hooks.before_step(step).await;

    let result = step_fn().await;

    if result.succeeded() {
        hooks.after_step(step).await;
    } else {
        debug!(step, "Step did not succeed, skipping sync-up");
    }

    result
}
