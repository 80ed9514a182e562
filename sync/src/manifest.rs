//! Baseline of relative paths known to exist in both roots
//!
//! A target-only file is removed by an incremental sync only when it is part
//! of the baseline, i.e. it was present on both sides after an earlier sync
//! and has since disappeared from the source.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{Result, SyncError};
use crate::filter::{MANIFEST_FILE_NAME, MANIFEST_TMP_FILE_NAME};

const MANIFEST_VERSION: u32 = 1;

/// Persisted set of synced relative paths, stored with `/` separators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    version: u32,
    paths: BTreeSet<String>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    pub fn new() -> Self {
        Self {
            version: MANIFEST_VERSION,
            paths: BTreeSet::new(),
        }
    }

    /// Location of the manifest inside a local root
    pub fn file_path(local_root: &Path) -> PathBuf {
        local_root.join(MANIFEST_FILE_NAME)
    }

    /// Whether a local root has ever completed an initial sync
    pub async fn exists(local_root: &Path) -> bool {
        fs::metadata(Self::file_path(local_root)).await.is_ok()
    }

    /// Load the manifest, or an empty one if the local root has none
    pub async fn load(local_root: &Path) -> Result<Self> {
        let path = Self::file_path(local_root);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => {
                return Err(SyncError::path_error(&path, format!("Failed to read manifest: {}", e)))
            }
        };

        let manifest: Manifest = serde_json::from_str(&content)?;
        if manifest.version != MANIFEST_VERSION {
            return Err(SyncError::path_error(
                &path,
                format!("Unsupported manifest version {}", manifest.version),
            ));
        }
        Ok(manifest)
    }

    /// Write the manifest next to the synced files, replacing the old one
    pub async fn save(&self, local_root: &Path) -> Result<()> {
        let path = Self::file_path(local_root);
        let tmp = local_root.join(MANIFEST_TMP_FILE_NAME);
        let content = serde_json::to_vec_pretty(self)?;

        fs::write(&tmp, content)
            .await
            .map_err(|e| SyncError::path_error(&tmp, format!("Failed to write manifest: {}", e)))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| SyncError::path_error(&path, format!("Failed to replace manifest: {}", e)))
    }

    pub fn contains(&self, relative_path: &Path) -> bool {
        self.paths.contains(&key(relative_path))
    }

    pub fn insert(&mut self, relative_path: &Path) -> bool {
        self.paths.insert(key(relative_path))
    }

    pub fn remove(&mut self, relative_path: &Path) -> bool {
        self.paths.remove(&key(relative_path))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Iterate over the stored paths in sorted order
    pub fn paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.paths.iter().map(PathBuf::from)
    }
}

/// Separator-independent key so a manifest written on one host reads the same on another
fn key(relative_path: &Path) -> String {
    relative_path
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_insert_and_remove() {
        let mut manifest = Manifest::new();
        assert!(manifest.insert(Path::new("results/output.txt")));
        assert!(!manifest.insert(Path::new("results/output.txt")));
        assert!(manifest.contains(Path::new("results/output.txt")));
        assert!(manifest.remove(Path::new("results/output.txt")));
        assert!(manifest.is_empty());
    }

    #[tokio::test]
    async fn test_missing_manifest_loads_empty() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!Manifest::exists(temp_dir.path()).await);
        let manifest = Manifest::load(temp_dir.path()).await.unwrap();
        assert!(manifest.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let mut manifest = Manifest::new();
        manifest.insert(Path::new(".snapshots/snap1/state.json"));
        manifest.insert(Path::new("data.csv"));
        manifest.save(temp_dir.path()).await.unwrap();

        assert!(Manifest::exists(temp_dir.path()).await);
        let loaded = Manifest::load(temp_dir.path()).await.unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!(
            loaded.paths().collect::<Vec<_>>(),
            vec![PathBuf::from(".snapshots/snap1/state.json"), PathBuf::from("data.csv")]
        );
    }

    #[tokio::test]
    async fn test_corrupt_manifest_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::write(Manifest::file_path(temp_dir.path()), b"not json").await.unwrap();
        assert!(matches!(
            Manifest::load(temp_dir.path()).await,
            Err(SyncError::Serialization(_))
        ));
    }
}
