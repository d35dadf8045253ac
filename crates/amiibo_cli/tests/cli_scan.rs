use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn fixture_path(name: &str) -> PathBuf {
    workspace_root().join("tests/fixtures").join(name)
}

fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_amiibo-doctor"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run amiibo-doctor CLI")
}

fn seeded_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    for (name, dest) in [
        ("valid_v4.nfc", "valid.nfc"),
        ("sn3_collision.nfc", "collision.nfc"),
        ("legacy_v2.nfc", "old/legacy.nfc"),
    ] {
        let dest = dir.path().join(dest);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).expect("create dir");
        }
        fs::copy(fixture_path(name), dest).expect("copy fixture");
    }
    dir
}

fn backup_dirs(root: &Path) -> Vec<PathBuf> {
    fs::read_dir(root)
        .expect("read root")
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("backup_"))
        })
        .collect()
}

#[test]
fn missing_directory_exits_with_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("nowhere");
    let output = run_cli(&[missing.to_str().expect("utf-8 path")]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not exist!"));
    assert!(output.stdout.is_empty());
}

#[test]
fn default_run_is_a_dry_run() {
    let dir = seeded_dir();
    let collision = dir.path().join("collision.nfc");
    let before = fs::read(&collision).expect("read");

    let output = run_cli(&[dir.path().to_str().expect("utf-8 path")]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("DRY RUN MODE - No files will be modified!"));
    assert!(stdout.contains("collision.nfc [NFC v4]: UID 04 AB 73 88 B8 B6 0F"));
    assert!(stdout.contains("Use --fix to actually modify them."));
    assert_eq!(fs::read(&collision).expect("read"), before);
    assert!(backup_dirs(dir.path()).is_empty());
}

#[test]
fn fix_rewrites_files_and_keeps_a_backup() {
    let dir = seeded_dir();
    let collision = dir.path().join("collision.nfc");
    let before = fs::read_to_string(&collision).expect("read");

    let output = run_cli(&["--fix", dir.path().to_str().expect("utf-8 path")]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Processing complete!"));
    assert!(stdout.contains("Files fixed: 1"));

    let after = fs::read_to_string(&collision).expect("read");
    assert_ne!(after, before);
    assert!(!after.contains("Page 1: 88"));
    assert!(after.contains("Page 134: 80 80 00 00"));
    assert!(after.contains("Page 130: 01 00 0F BF"));

    let backups = backup_dirs(dir.path());
    assert_eq!(backups.len(), 1);
    let saved = fs::read_to_string(backups[0].join("collision.nfc")).expect("backup copy");
    assert_eq!(saved, before);
    assert!(!backups[0].join("valid.nfc").exists());
}

#[test]
fn disabled_fix_groups_are_respected() {
    let dir = seeded_dir();
    let output = run_cli(&[
        "--fix",
        "--no-pack",
        "--no-uid",
        dir.path().to_str().expect("utf-8 path"),
    ]);
    assert!(output.status.success());

    let after = fs::read_to_string(dir.path().join("collision.nfc")).expect("read");
    assert!(after.contains("Page 1: 88 B8 B6 0F"));
    assert!(after.contains("Page 134: 00 00 00 00"));
    assert!(after.contains("Page 0: 04 AB 73 54"));
    assert!(after.contains("Page 2: 89 48 0F E0"));
}

#[test]
fn convert_v4_with_fix_upgrades_legacy_files() {
    let dir = seeded_dir();
    let output = run_cli(&[
        "--fix",
        "--convert-v4",
        dir.path().to_str().expect("utf-8 path"),
    ]);
    assert!(output.status.success());

    let legacy = fs::read_to_string(dir.path().join("old/legacy.nfc")).expect("read");
    assert!(legacy.contains("\nVersion: 4\n"));
    assert!(legacy.contains("\nPages total: 135\n"));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Converted V2 to V4"));
    assert!(stdout.contains("Files converted to V4: 1"));
}

#[test]
fn json_output_is_machine_readable() {
    let dir = seeded_dir();
    let output = run_cli(&["--json", "--convert-v4", dir.path().to_str().expect("utf-8 path")]);
    assert!(output.status.success());

    let value: Value = serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(value["mode"], Value::from("dry_run"));
    assert_eq!(value["upgrade_requested"], Value::Bool(true));
    assert_eq!(value["summary"]["total"], Value::from(3));
    assert_eq!(value["summary"]["would_convert"], Value::from(1));
    assert_eq!(value["summary"]["valid"], Value::from(1));
}
