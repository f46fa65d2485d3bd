//! Byte-for-byte rollback tests
//!
//! A failed or interrupted import must leave the data directory exactly as
//! it was: same database bytes, same upload files, nothing extra.

use sha2::{Digest, Sha256};
use sprout_core::backup::{
    create_rollback_point, disarm_rollback_point, recover_interrupted_imports,
};
use sprout_core::project::NewProject;
use sprout_core::storage::{ProjectStore, StoreError};
use sprout_core::{
    export_archive, import_archive, DataLayout, ImportError, ImportOptions, StoreHandle,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use walkdir::WalkDir;

/// Relative path -> SHA-256 of every file under `root`, skipping the work area
fn snapshot_directory(root: &Path) -> BTreeMap<String, String> {
    let mut snapshot = BTreeMap::new();
    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".work");
    for entry in walker {
        let entry = entry.unwrap();
        if entry.file_type().is_file() {
            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .to_string();
            let content = fs::read(entry.path()).unwrap();
            let mut hasher = Sha256::new();
            hasher.update(&content);
            snapshot.insert(relative, hex::encode(hasher.finalize()));
        }
    }
    snapshot
}

/// A data directory with one project, nested uploads, and no open handle
fn create_data_dir(root: &Path, project: &str) -> DataLayout {
    let layout = DataLayout::new(root);
    layout.ensure_dirs().unwrap();
    {
        let handle = StoreHandle::open(&layout.database).unwrap();
        handle
            .with_db(|db| {
                ProjectStore::new(db.connection())
                    .create(&NewProject::named(project))
                    .map_err(StoreError::from)
            })
            .unwrap();
    }
    fs::create_dir_all(layout.uploads.join("2024")).unwrap();
    fs::write(layout.uploads.join("a.jpg"), b"0123456789").unwrap();
    fs::write(layout.uploads.join("2024/b.png"), format!("{project}-b")).unwrap();
    layout
}

/// Archive of a different data directory, written to `dir`
fn foreign_archive(dir: &Path) -> std::path::PathBuf {
    let layout = create_data_dir(&dir.join("foreign"), "Foreign");
    fs::write(layout.uploads.join("only-in-archive.jpg"), b"zz").unwrap();
    let handle = StoreHandle::open(&layout.database).unwrap();
    let exported = export_archive(&handle, &layout).unwrap();
    let path = dir.join(&exported.file_name);
    fs::write(&path, exported.bytes).unwrap();
    path
}

#[test]
fn test_failed_import_is_byte_for_byte() {
    let temp = TempDir::new().unwrap();
    let archive = foreign_archive(temp.path());
    let layout = create_data_dir(&temp.path().join("live"), "Oak");
    let before = snapshot_directory(&layout.root);

    let handle = StoreHandle::open(&layout.database).unwrap();
    let options = ImportOptions {
        quiesce_timeout: Duration::ZERO,
    };
    let err = import_archive(&handle, &layout, &archive, &options).unwrap_err();
    assert!(matches!(err, ImportError::Aborted { .. }), "{err:?}");
    drop(handle);

    assert_eq!(snapshot_directory(&layout.root), before);
}

#[test]
fn test_rejected_archive_is_byte_for_byte() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("truncated.zip");
    let full = fs::read(foreign_archive(temp.path())).unwrap();
    fs::write(&archive, &full[..full.len() / 2]).unwrap();

    let layout = create_data_dir(&temp.path().join("live"), "Oak");
    let before = snapshot_directory(&layout.root);

    let handle = StoreHandle::open(&layout.database).unwrap();
    let err = import_archive(&handle, &layout, &archive, &ImportOptions::default()).unwrap_err();
    assert!(err.is_user_error(), "{err:?}");
    drop(handle);

    assert_eq!(snapshot_directory(&layout.root), before);
}

#[test]
fn test_recovery_at_every_crash_point() {
    // How far the install got before the process died
    for installed in 0..=2 {
        let temp = TempDir::new().unwrap();
        let layout = create_data_dir(&temp.path().join("live"), "Oak");
        let before = snapshot_directory(&layout.root);

        let _point = create_rollback_point(&layout, &mut || Ok(())).unwrap();
        if installed >= 1 {
            fs::write(&layout.database, b"new database").unwrap();
        }
        if installed >= 2 {
            fs::create_dir_all(&layout.uploads).unwrap();
            fs::write(layout.uploads.join("new.jpg"), b"new").unwrap();
        }

        let report = recover_interrupted_imports(&layout).unwrap();
        assert_eq!(report.restored, 1, "crash point {installed}");
        assert_eq!(
            snapshot_directory(&layout.root),
            before,
            "crash point {installed}"
        );
        assert_eq!(fs::read_dir(&layout.work).unwrap().count(), 0);
    }
}

#[test]
fn test_sidecar_files_are_parked_and_restored() {
    let temp = TempDir::new().unwrap();
    let layout = create_data_dir(&temp.path().join("live"), "Oak");
    let journal = layout.root.join("store.db-journal");
    fs::write(&journal, b"hot journal").unwrap();
    let before = snapshot_directory(&layout.root);

    let point = create_rollback_point(&layout, &mut || Ok(())).unwrap();
    assert!(!journal.exists());
    assert_eq!(point.marker.sidecars, ["-journal"]);

    let report = recover_interrupted_imports(&layout).unwrap();
    assert_eq!(report.restored, 1);
    assert_eq!(snapshot_directory(&layout.root), before);
}

#[test]
fn test_recovery_without_upload_dir_removes_installed_uploads() {
    let temp = TempDir::new().unwrap();
    let layout = create_data_dir(&temp.path().join("live"), "Oak");
    fs::remove_dir_all(&layout.uploads).unwrap();
    let before = snapshot_directory(&layout.root);

    let point = create_rollback_point(&layout, &mut || Ok(())).unwrap();
    assert!(!point.marker.had_uploads);
    fs::create_dir_all(&layout.uploads).unwrap();
    fs::write(layout.uploads.join("new.jpg"), b"new").unwrap();

    recover_interrupted_imports(&layout).unwrap();
    assert!(!layout.uploads.exists());
    assert_eq!(snapshot_directory(&layout.root), before);
}

fn project_names(handle: &StoreHandle) -> Vec<String> {
    handle
        .with_db(|db| {
            ProjectStore::new(db.connection())
                .list(None)
                .map_err(StoreError::from)
        })
        .unwrap()
        .into_iter()
        .map(|p| p.project.name)
        .collect()
}

fn add_project(handle: &StoreHandle, name: &str) {
    handle
        .with_db(|db| {
            ProjectStore::new(db.connection())
                .create(&NewProject::named(name))
                .map_err(StoreError::from)
        })
        .unwrap();
}

#[test]
fn test_writes_after_commit_survive_crash_before_cleanup() {
    let temp = TempDir::new().unwrap();
    let foreign = create_data_dir(&temp.path().join("foreign"), "Foreign");
    let layout = create_data_dir(&temp.path().join("live"), "Oak");
    let handle = StoreHandle::open(&layout.database).unwrap();

    // Install by hand and stop right after the store is back, before the
    // rollback point directory is deleted
    let mut quiesced = handle.quiesce().unwrap();
    let point = create_rollback_point(&layout, &mut || Ok(())).unwrap();
    fs::copy(&foreign.database, &layout.database).unwrap();
    fs::rename(&foreign.uploads, &layout.uploads).unwrap();
    quiesced
        .reopen_with(|| -> Result<(), Box<dyn std::error::Error>> {
            disarm_rollback_point(&point)?;
            Ok(())
        })
        .unwrap();
    drop(quiesced);
    add_project(&handle, "Written after import");
    drop(handle);
    assert!(point.dir.exists());

    let report = recover_interrupted_imports(&layout).unwrap();
    assert_eq!(report.restored, 0);
    assert_eq!(fs::read_dir(&layout.work).unwrap().count(), 0);

    let handle = StoreHandle::open(&layout.database).unwrap();
    let names = project_names(&handle);
    assert!(names.contains(&"Foreign".to_string()), "{names:?}");
    assert!(names.contains(&"Written after import".to_string()), "{names:?}");
    assert!(!names.contains(&"Oak".to_string()), "{names:?}");
    assert_eq!(fs::read(layout.uploads.join("2024/b.png")).unwrap(), b"Foreign-b");
}

#[test]
fn test_successful_import_leaves_nothing_to_recover() {
    let temp = TempDir::new().unwrap();
    let archive = foreign_archive(temp.path());
    let layout = create_data_dir(&temp.path().join("live"), "Oak");

    let handle = StoreHandle::open(&layout.database).unwrap();
    import_archive(&handle, &layout, &archive, &ImportOptions::default()).unwrap();
    add_project(&handle, "Written after import");
    drop(handle);

    let report = recover_interrupted_imports(&layout).unwrap();
    assert_eq!(report.restored, 0);

    let handle = StoreHandle::open(&layout.database).unwrap();
    let names = project_names(&handle);
    assert!(names.contains(&"Foreign".to_string()), "{names:?}");
    assert!(names.contains(&"Written after import".to_string()), "{names:?}");
    assert!(layout.uploads.join("only-in-archive.jpg").exists());
}
