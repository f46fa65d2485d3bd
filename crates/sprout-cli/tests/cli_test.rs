//! CLI integration tests using assert_cmd
//!
//! These tests run the `sprout` binary against temporary data directories.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Get a command instance for the sprout binary
fn sprout_cmd() -> Command {
    let mut cmd = Command::cargo_bin("sprout").expect("Failed to find sprout binary");
    cmd.env_remove("SPROUT_STORAGE__DATA_DIR");
    cmd
}

/// A data directory with a valid, empty store and one upload file
fn seeded_data_dir(root: &Path) -> PathBuf {
    let data = root.join("data");
    let layout = sprout_core::config::DataLayout::new(&data);
    layout.ensure_dirs().unwrap();
    sprout_core::StoreHandle::open(&layout.database).unwrap();
    fs::write(layout.uploads.join("a.jpg"), b"0123456789").unwrap();
    data
}

fn export_to(data: &Path, out: &Path) -> PathBuf {
    sprout_cmd()
        .arg("--data-dir")
        .arg(data)
        .arg("export")
        .arg("--output")
        .arg(out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported backup to"));

    fs::read_dir(out)
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| p.extension().is_some_and(|ext| ext == "zip"))
        .expect("no archive written")
}

#[test]
fn test_help_command() {
    sprout_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sprout - photo journal backup tool"));
}

#[test]
fn test_version_command() {
    sprout_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sprout"));
}

#[test]
fn test_export_without_store_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    sprout_cmd()
        .arg("--data-dir")
        .arg(temp_dir.path().join("nothing-here"))
        .arg("export")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No store found"));
}

#[test]
fn test_export_then_inspect() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let data = seeded_data_dir(temp_dir.path());
    let out = temp_dir.path().join("out");
    fs::create_dir_all(&out).unwrap();

    let archive = export_to(&data, &out);
    let name = archive.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("sprout-backup-"), "{name}");

    sprout_cmd()
        .arg("inspect")
        .arg(&archive)
        .assert()
        .success()
        .stdout(predicate::str::contains("Checksums: verified"))
        .stdout(predicate::str::contains("Upload files: 1"));

    let output = sprout_cmd()
        .arg("inspect")
        .arg("--json")
        .arg(&archive)
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["format_version"], 1);
    assert_eq!(json["uploads"], 1);
    assert_eq!(json["projects"], 0);
}

#[test]
fn test_import_replaces_data_dir() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let source = seeded_data_dir(&temp_dir.path().join("source"));
    let out = temp_dir.path().join("out");
    fs::create_dir_all(&out).unwrap();
    let archive = export_to(&source, &out);

    let target = seeded_data_dir(&temp_dir.path().join("target"));
    fs::write(target.join("uploads/stray.jpg"), b"stray").unwrap();

    sprout_cmd()
        .arg("--data-dir")
        .arg(&target)
        .arg("import")
        .arg(&archive)
        .assert()
        .success()
        .stdout(predicate::str::contains("Upload files: 1"));

    assert_eq!(fs::read(target.join("uploads/a.jpg")).unwrap(), b"0123456789");
    assert!(!target.join("uploads/stray.jpg").exists());
}

#[test]
fn test_inspect_rejects_non_archive() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let bogus = temp_dir.path().join("bogus.zip");
    fs::write(&bogus, b"not a zip").unwrap();

    sprout_cmd()
        .arg("inspect")
        .arg(&bogus)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a usable backup"));
}

#[test]
fn test_import_rejects_archive_without_database() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let target = seeded_data_dir(temp_dir.path());
    let before = fs::read(target.join("store.db")).unwrap();

    let archive = temp_dir.path().join("no-db.zip");
    let mut zip = zip::ZipWriter::new(fs::File::create(&archive).unwrap());
    zip.start_file("uploads/a.jpg", zip::write::FileOptions::default())
        .unwrap();
    zip.write_all(b"0123456789").unwrap();
    zip.finish().unwrap();

    sprout_cmd()
        .arg("--data-dir")
        .arg(&target)
        .arg("import")
        .arg(&archive)
        .assert()
        .failure()
        .stderr(predicate::str::contains("store.db"));

    assert_eq!(fs::read(target.join("store.db")).unwrap(), before);
}
