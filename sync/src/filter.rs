//! Ignore policy for sync operations using globset
//!
//! The reserved set is closed: cache directories, OS metadata files and the
//! engine's own bookkeeping files are never synced. Any other dot-prefixed
//! entry (`.snapshots/`, `.workflow_status/`, ...) is synced like a regular file.

use std::path::Path;
use globset::{GlobSet, GlobSetBuilder};

use crate::error::{Result, SyncError};

/// File name of the sync log written into the local root
pub const SYNC_LOG_FILE_NAME: &str = ".sync_log.json";

/// File name of the baseline manifest written into the local root
pub const MANIFEST_FILE_NAME: &str = ".smart_sync_manifest.json";

/// Scratch file the manifest is written to before being renamed into place
pub const MANIFEST_TMP_FILE_NAME: &str = ".smart_sync_manifest.json.tmp";

/// Directory names whose whole subtree is excluded
pub const IGNORED_DIR_NAMES: &[&str] = &["__pycache__", ".pytest_cache", ".ipynb_checkpoints"];

/// File names excluded wherever they appear
pub const IGNORED_FILE_NAMES: &[&str] = &[
    ".DS_Store",
    "Thumbs.db",
    "desktop.ini",
    SYNC_LOG_FILE_NAME,
    MANIFEST_FILE_NAME,
    MANIFEST_TMP_FILE_NAME,
];

/// Decides which relative paths are excluded from every sync operation
#[derive(Debug, Clone)]
pub struct IgnorePolicy {
    reserved: GlobSet,
    extra: Option<GlobSet>,
    extra_patterns: Vec<String>,
}

impl Default for IgnorePolicy {
    fn default() -> Self {
        Self {
            reserved: reserved_set(),
            extra: None,
            extra_patterns: Vec::new(),
        }
    }
}

impl IgnorePolicy {
    /// Create the reserved policy widened by extra glob patterns
    pub fn with_extra_patterns(patterns: &[String]) -> Result<Self> {
        let extra = if patterns.is_empty() {
            None
        } else {
            Some(build_globset(patterns)?)
        };

        Ok(Self {
            reserved: reserved_set(),
            extra,
            extra_patterns: patterns.to_vec(),
        })
    }

    /// Check whether a path relative to a sync root must be skipped
    pub fn should_ignore(&self, relative_path: &Path) -> bool {
        if self.reserved.is_match(relative_path) {
            return true;
        }

        self.extra
            .as_ref()
            .map(|set| set.is_match(relative_path))
            .unwrap_or(false)
    }

    /// Extra patterns this policy was built with
    pub fn extra_patterns(&self) -> &[String] {
        &self.extra_patterns
    }
}

fn reserved_set() -> GlobSet {
    let mut patterns = Vec::new();
    for dir in IGNORED_DIR_NAMES {
        patterns.push(format!("**/{}", dir));
        patterns.push(format!("**/{}/**", dir));
    }
    for name in IGNORED_FILE_NAMES {
        patterns.push(format!("**/{}", name));
    }
    patterns.push("**/*.pyc".to_string());

    // The reserved patterns are literals known to compile.
    build_globset(&patterns).unwrap_or_else(|_| GlobSet::empty())
}

/// Build a case-insensitive globset from patterns
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();

    for pattern in patterns {
        let mut glob = globset::GlobBuilder::new(pattern);
        glob.case_insensitive(true).literal_separator(true);

        let compiled_glob = glob.build().map_err(|e| {
            SyncError::FilterPattern(format!("Failed to compile glob '{}': {}", pattern, e))
        })?;

        builder.add(compiled_glob);
    }

    builder.build().map_err(|e| {
        SyncError::FilterPattern(format!("Failed to build globset: {}", e))
    })
}
