//! Decides whether a project path needs Smart Sync at all
//!
//! Docker Desktop on Windows cannot reliably bind-mount mapped network drives,
//! so those projects are mirrored to local disk first. Everything else runs
//! directly against the project path.

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

/// Host operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostOs {
    Windows,
    MacOs,
    Linux,
    Other,
}

impl HostOs {
    /// OS of the running process
    pub fn current() -> Self {
        match std::env::consts::OS {
            "windows" => HostOs::Windows,
            "macos" => HostOs::MacOs,
            "linux" => HostOs::Linux,
            _ => HostOs::Other,
        }
    }
}

/// How a project directory should be mounted into the workflow container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// Mount the project path directly
    Native,
    /// Mirror a Windows network location to a local staging root
    WindowsNetworkDrive,
}

impl Scenario {
    pub fn needs_smart_sync(self) -> bool {
        matches!(self, Scenario::WindowsNetworkDrive)
    }
}

/// Classify `project_path` on `os`
pub fn detect(os: HostOs, project_path: &str) -> Scenario {
    if os != HostOs::Windows {
        return Scenario::Native;
    }

    let trimmed = project_path.trim();
    if trimmed.starts_with(r"\\") || trimmed.starts_with("//") {
        return Scenario::WindowsNetworkDrive;
    }

    match drive_letter(trimmed) {
        Some(letter) if !letter.eq_ignore_ascii_case(&'c') => Scenario::WindowsNetworkDrive,
        _ => Scenario::Native,
    }
}

fn drive_letter(path: &str) -> Option<char> {
    let mut chars = path.chars();
    let letter = chars.next()?;
    if letter.is_ascii_alphabetic() && chars.next() == Some(':') {
        Some(letter)
    } else {
        None
    }
}

/// Default staging directory for a project name
pub fn default_local_root(project_name: &str) -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("smart-sync")
        .join(sanitize_name(project_name))
}

/// Last path component of a project path, used to name its staging root
pub fn project_name(project_path: &Path) -> String {
    project_path
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .last()
        .unwrap_or_else(|| "project".to_string())
}

fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "project".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(HostOs::Windows, r"\\labserver\projects\run42", Scenario::WindowsNetworkDrive)]
    #[case(HostOs::Windows, "//labserver/projects/run42", Scenario::WindowsNetworkDrive)]
    #[case(HostOs::Windows, r"Z:\projects\run42", Scenario::WindowsNetworkDrive)]
    #[case(HostOs::Windows, r"C:\Users\lab\run42", Scenario::Native)]
    #[case(HostOs::Windows, r"c:\Users\lab\run42", Scenario::Native)]
    #[case(HostOs::MacOs, "/Volumes/share/run42", Scenario::Native)]
    #[case(HostOs::Linux, "/mnt/share/run42", Scenario::Native)]
    fn test_detect(#[case] os: HostOs, #[case] path: &str, #[case] expected: Scenario) {
        assert_eq!(detect(os, path), expected);
    }

    #[test]
    fn test_local_root_uses_project_name() {
        let root = default_local_root("run 42");
        assert!(root.ends_with("smart-sync/run_42"));
    }

    #[test]
    fn test_project_name() {
        assert_eq!(project_name(Path::new("/mnt/share/run42/")), "run42");
        assert_eq!(project_name(Path::new("/")), "project");
    }
}
