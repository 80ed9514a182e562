//! Directory scanning using walkdir
//!
//! Walks run on the blocking pool. Entries that fail mid-walk (permission
//! denied, vanished) are logged and skipped; only an unusable root aborts a scan.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Result, RootRole, SyncError};
use crate::filter::IgnorePolicy;

/// Regular file with the metadata change detection needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Relative path from the scan root
    pub relative_path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified time at the resolution the filesystem exposes
    pub modified: SystemTime,
}

/// Result of walking one root
#[derive(Debug, Clone, Default)]
pub struct ScanIndex {
    /// Regular files keyed by relative path
    pub files: BTreeMap<PathBuf, FileEntry>,
    /// Directories, parents before children
    pub directories: Vec<PathBuf>,
    /// Entries skipped because they could not be read
    pub skipped: usize,
}

impl ScanIndex {
    /// Look up a file by relative path
    pub fn get(&self, relative_path: &Path) -> Option<&FileEntry> {
        self.files.get(relative_path)
    }

    pub fn contains(&self, relative_path: &Path) -> bool {
        self.files.contains_key(relative_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Directory scanner that applies the ignore policy while walking
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    policy: IgnorePolicy,
}

impl DirectoryScanner {
    /// Create a new directory scanner with an ignore policy
    pub fn new(policy: IgnorePolicy) -> Self {
        Self { policy }
    }

    /// Scan a root that must exist
    pub async fn scan(&self, root: &Path, role: RootRole) -> Result<ScanIndex> {
        check_root(root, role).await?;

        let scanner = self.clone();
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || Ok(scanner.walk(&root)))
            .await
            .map_err(|e| SyncError::Generic(anyhow::anyhow!("Scan task failed: {}", e)))?
    }

    /// Scan a root, treating a missing root as empty
    pub async fn scan_or_empty(&self, root: &Path, role: RootRole) -> Result<ScanIndex> {
        if tokio::fs::metadata(root).await.is_err() {
            debug!("{} root '{}' does not exist yet, treating as empty", role, root.display());
            return Ok(ScanIndex::default());
        }
        self.scan(root, role).await
    }

    /// Blocking walk of a root directory
    fn walk(&self, root: &Path) -> ScanIndex {
        let mut index = ScanIndex::default();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| match entry.path().strip_prefix(root) {
                Ok(relative) if relative.as_os_str().is_empty() => true,
                Ok(relative) => !self.policy.should_ignore(relative),
                Err(_) => false,
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under '{}': {}", root.display(), e);
                    index.skipped += 1;
                    continue;
                }
            };

            if entry.depth() == 0 {
                continue;
            }

            let relative_path = match entry.path().strip_prefix(root) {
                Ok(relative) => relative.to_path_buf(),
                Err(_) => continue,
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                index.directories.push(relative_path);
                continue;
            }

            if !file_type.is_file() {
                debug!("Skipping non-regular entry '{}'", relative_path.display());
                continue;
            }

            match entry.metadata() {
                Ok(metadata) => {
                    let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                    index.files.insert(
                        relative_path.clone(),
                        FileEntry {
                            relative_path,
                            size: metadata.len(),
                            modified,
                        },
                    );
                }
                Err(e) => {
                    warn!("Skipping '{}': failed to read metadata: {}", relative_path.display(), e);
                    index.skipped += 1;
                }
            }
        }

        index
    }
}

/// Fail with `RootUnavailable` unless `root` is a readable directory
pub(crate) async fn check_root(root: &Path, role: RootRole) -> Result<()> {
    let metadata = tokio::fs::metadata(root)
        .await
        .map_err(|e| SyncError::root_unavailable(role, root, e.to_string()))?;

    if !metadata.is_dir() {
        return Err(SyncError::root_unavailable(role, root, "Path is not a directory"));
    }

    Ok(())
}
