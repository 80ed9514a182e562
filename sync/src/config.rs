//! Smart Sync configuration
//!
//! Read once by the launcher (from the environment or a TOML file) and passed
//! explicitly into the manager and hooks.

use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

pub const ENV_ENABLED: &str = "SMART_SYNC_ENABLED";
pub const ENV_NETWORK_ROOT: &str = "NETWORK_PROJECT_PATH";
pub const ENV_LOCAL_ROOT: &str = "LOCAL_PROJECT_PATH";
pub const ENV_PRE_STEP_TIMEOUT: &str = "SMART_SYNC_PRE_STEP_TIMEOUT_SECS";
pub const ENV_POST_STEP_TIMEOUT: &str = "SMART_SYNC_POST_STEP_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartSyncConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Authoritative project directory
    #[serde(default)]
    pub network_root: PathBuf,
    /// Local staging directory the workflow runs against
    #[serde(default)]
    pub local_root: PathBuf,
    /// Upper bound for the sync-down before each step
    #[serde(default = "default_pre_step_timeout", with = "humantime_serde")]
    pub pre_step_timeout: Duration,
    /// Upper bound for the sync-up after each successful step
    #[serde(default = "default_post_step_timeout", with = "humantime_serde")]
    pub post_step_timeout: Duration,
    /// Glob patterns ignored on top of the reserved set
    #[serde(default)]
    pub extra_ignore_patterns: Vec<String>,
}

impl Default for SmartSyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            network_root: PathBuf::new(),
            local_root: PathBuf::new(),
            pre_step_timeout: default_pre_step_timeout(),
            post_step_timeout: default_post_step_timeout(),
            extra_ignore_patterns: Vec::new(),
        }
    }
}

impl SmartSyncConfig {
    /// Enabled configuration for a root pair with default timeouts
    pub fn new(network_root: impl Into<PathBuf>, local_root: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            network_root: network_root.into(),
            local_root: local_root.into(),
            ..Default::default()
        }
    }

    /// Read the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    ///
    /// Only the exact value `"true"` enables sync. A disabled configuration
    /// ignores the path variables entirely.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled = lookup(ENV_ENABLED).map(|v| v == "true").unwrap_or(false);
        if !enabled {
            return Ok(Self::default());
        }

        let network_root = lookup(ENV_NETWORK_ROOT)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| SyncError::config_error(format!("{} is not set", ENV_NETWORK_ROOT)))?;
        let local_root = lookup(ENV_LOCAL_ROOT)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| SyncError::config_error(format!("{} is not set", ENV_LOCAL_ROOT)))?;

        let mut config = Self::new(network_root.trim(), local_root.trim());
        if let Some(secs) = parse_secs(&lookup, ENV_PRE_STEP_TIMEOUT)? {
            config.pre_step_timeout = secs;
        }
        if let Some(secs) = parse_secs(&lookup, ENV_POST_STEP_TIMEOUT)? {
            config.post_step_timeout = secs;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load a TOML configuration file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SyncError::path_error(path, format!("Failed to read config: {}", e)))?;
        let config: SmartSyncConfig = toml::from_str(&content)
            .map_err(|e| SyncError::config_error(format!("Invalid config '{}': {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Write this configuration as TOML
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = self.to_toml()?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| SyncError::path_error(path, format!("Failed to write config: {}", e)))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SyncError::config_error(format!("Failed to serialize config: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.network_root.as_os_str().is_empty() {
            return Err(SyncError::config_error("network_root is empty"));
        }
        if self.local_root.as_os_str().is_empty() {
            return Err(SyncError::config_error("local_root is empty"));
        }
        if self.network_root == self.local_root {
            return Err(SyncError::config_error(format!(
                "network_root and local_root are the same path: {}",
                self.network_root.display()
            )));
        }
        if self.pre_step_timeout.is_zero() || self.post_step_timeout.is_zero() {
            return Err(SyncError::config_error("step timeouts must be greater than zero"));
        }

        Ok(())
    }
}

fn parse_secs<F>(lookup: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|e| SyncError::config_error(format!("{} must be whole seconds: {}", key, e))),
    }
}

fn default_pre_step_timeout() -> Duration { Duration::from_secs(30) }
fn default_post_step_timeout() -> Duration { Duration::from_secs(60) }
