//! Unit tests for change detection and plan generation

use crate::diff::*;
use crate::manifest::Manifest;
use crate::scanner::{FileEntry, ScanIndex};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use test_case::test_case;

/// Build a file entry modified `offset_secs` after a fixed base time
fn file_entry(relative_path: &str, size: u64, offset_secs: u64) -> FileEntry {
    FileEntry {
        relative_path: PathBuf::from(relative_path),
        size,
        modified: SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000 + offset_secs),
    }
}

fn index(entries: &[(&str, u64, u64)]) -> ScanIndex {
    let mut index = ScanIndex::default();
    for (path, size, offset) in entries {
        let entry = file_entry(path, *size, *offset);
        index.files.insert(entry.relative_path.clone(), entry);
    }
    index
}

fn baseline(paths: &[&str]) -> Manifest {
    let mut manifest = Manifest::new();
    for path in paths {
        manifest.insert(Path::new(path));
    }
    manifest
}

mod change_set_tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_missing_in_target_is_changed() {
        let source = index(&[("data.csv", 10, 0)]);
        let target = index(&[]);
        let changes = DiffEngine::change_set_from_indexes(&source, &target);
        assert!(changes.contains(Path::new("data.csv")));
        assert_eq!(changes.len(), 1);
    }

    #[test_case(5, 0, true ; "source strictly newer")]
    #[test_case(0, 0, false ; "equal mtime is no change")]
    #[test_case(0, 5, false ; "target newer is no change")]
    fn test_mtime_rule(source_offset: u64, target_offset: u64, expected: bool) {
        let source = index(&[("data.csv", 10, source_offset)]);
        let target = index(&[("data.csv", 10, target_offset)]);
        let changes = DiffEngine::change_set_from_indexes(&source, &target);
        assert_eq!(changes.contains(Path::new("data.csv")), expected);
    }

    #[test]
    fn test_size_difference_alone_is_not_a_change() {
        let source = index(&[("data.csv", 99, 0)]);
        let target = index(&[("data.csv", 10, 0)]);
        assert!(DiffEngine::change_set_from_indexes(&source, &target).is_empty());
    }

    #[test]
    fn test_target_only_file_is_not_in_change_set() {
        let source = index(&[]);
        let target = index(&[("orphan.txt", 1, 0)]);
        assert!(DiffEngine::change_set_from_indexes(&source, &target).is_empty());
    }
}

mod plan_tests {
    use super::*;

    #[test]
    fn test_plan_classifies_actions() {
        let source = index(&[("new.txt", 3, 0), ("edited.txt", 7, 10), ("same.txt", 1, 0), ("older.txt", 1, 0)]);
        let target = index(&[("edited.txt", 5, 0), ("same.txt", 1, 0), ("older.txt", 1, 10), ("gone.txt", 2, 0)]);

        let plan = DiffEngine::plan_from_indexes(SyncDirection::Up, &source, &target, &baseline(&["gone.txt"]));

        assert_eq!(plan.summary.copies, 1);
        assert_eq!(plan.summary.updates, 1);
        assert_eq!(plan.summary.deletes, 1);
        assert_eq!(plan.summary.unchanged, 1);
        assert_eq!(plan.summary.target_newer, 1);
        assert_eq!(plan.summary.total_bytes_to_transfer, 10);
        assert_eq!(
            plan.actions,
            vec![
                SyncAction::Delete { path: PathBuf::from("gone.txt") },
                SyncAction::Update { path: PathBuf::from("edited.txt"), file_size: 7 },
                SyncAction::Copy { path: PathBuf::from("new.txt"), file_size: 3 },
            ]
        );
    }

    #[test]
    fn test_untracked_target_file_is_kept() {
        let source = index(&[]);
        let target = index(&[("step_output.csv", 4, 0)]);

        let plan = DiffEngine::plan_from_indexes(SyncDirection::Down, &source, &target, &Manifest::new());

        assert!(plan.is_empty());
        assert_eq!(plan.summary.untracked, 1);
    }

    #[test]
    fn test_shared_lists_paths_in_both_roots() {
        let source = index(&[("a.txt", 1, 0), ("b.txt", 1, 5)]);
        let target = index(&[("a.txt", 1, 0), ("b.txt", 1, 0), ("c.txt", 1, 0)]);

        let plan = DiffEngine::plan_from_indexes(SyncDirection::Down, &source, &target, &Manifest::new());

        assert_eq!(plan.shared, vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
    }

    #[test]
    fn test_deletions_run_before_copies_when_a_directory_became_a_file() {
        // `a/b.txt` was synced before; the source now has a file named `a`
        let source = index(&[("a", 4, 10)]);
        let target = index(&[("a/b.txt", 1, 0)]);

        let plan = DiffEngine::plan_from_indexes(SyncDirection::Down, &source, &target, &baseline(&["a/b.txt"]));

        assert_eq!(
            plan.actions,
            vec![
                SyncAction::Delete { path: PathBuf::from("a/b.txt") },
                SyncAction::Copy { path: PathBuf::from("a"), file_size: 4 },
            ]
        );
    }

    #[test]
    fn test_direction_roles_and_parsing() {
        use crate::error::RootRole;
        assert_eq!(SyncDirection::Down.source_role(), RootRole::Network);
        assert_eq!(SyncDirection::Up.source_role(), RootRole::Local);
        assert_eq!("UP".parse::<SyncDirection>().unwrap(), SyncDirection::Up);
        assert!("sideways".parse::<SyncDirection>().is_err());
    }
}
