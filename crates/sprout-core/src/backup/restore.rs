//! Restoring rollback points, during import and at startup

use super::{
    RecoveryReport, RollbackError, RollbackMarker, RollbackPoint, DISCARD_PREFIX, INCOMING_PREFIX,
    MARKER_FILE, ROLLBACK_PREFIX, SIDECAR_SUFFIXES, STAGING_PREFIX,
};
use crate::backup::types::live_sidecar;
use crate::config::DataLayout;
use crate::util::{move_path, remove_path};
use std::fs;
use std::io;

/// Put parked files back in place, replacing whatever an import installed,
/// then delete the rollback directory.
///
/// Only parts that were actually parked are touched, so this is safe to run
/// against a point whose parking was interrupted.
///
/// # Errors
/// Returns an error if any file cannot be moved back
pub fn restore_rollback_point(point: &RollbackPoint, layout: &DataLayout) -> Result<(), RollbackError> {
    let mut no_deadline = || -> io::Result<()> { Ok(()) };

    let parked_db = point.database_path();
    if parked_db.exists() {
        remove_path(&layout.database)?;
        for suffix in SIDECAR_SUFFIXES {
            remove_path(&live_sidecar(&layout.database, suffix))?;
        }
        move_path(&parked_db, &layout.database, &mut no_deadline)?;

        for suffix in &point.marker.sidecars {
            let parked = point.sidecar_path(suffix);
            if parked.exists() {
                move_path(&parked, &live_sidecar(&layout.database, suffix), &mut no_deadline)?;
            }
        }
    }

    let parked_uploads = point.uploads_path();
    if !point.marker.had_uploads {
        // Nothing existed before the import, so anything here was installed
        remove_path(&layout.uploads)?;
    } else if parked_uploads.exists() {
        remove_path(&layout.uploads)?;
        move_path(&parked_uploads, &layout.uploads, &mut no_deadline)?;
    }

    remove_path(&point.dir)?;

    tracing::info!(rollback = %point.dir.display(), "Rollback point restored");
    Ok(())
}

/// Clean up after a process that died mid-import.
///
/// A `rollback-*` directory with a marker means an import never committed:
/// its parked files are restored. One without a marker belongs to a
/// committed import and is removed, as are staging directories, half-deleted
/// rollback points, and uploaded archives. Run before the store
/// is opened.
///
/// # Errors
/// Returns an error if the work area cannot be read or a restore fails
pub fn recover_interrupted_imports(layout: &DataLayout) -> Result<RecoveryReport, RollbackError> {
    let mut report = RecoveryReport::default();

    let entries = match fs::read_dir(&layout.work) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(report),
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();

        if name.starts_with(ROLLBACK_PREFIX) {
            let marker_path = path.join(MARKER_FILE);
            if marker_path.exists() {
                let marker: RollbackMarker = serde_json::from_slice(&fs::read(&marker_path)?)?;
                tracing::warn!(
                    rollback = %path.display(),
                    created_at = %marker.created_at,
                    "Found interrupted import, restoring pre-import data"
                );
                restore_rollback_point(&RollbackPoint { dir: path, marker }, layout)?;
                report.restored += 1;
            } else {
                // Marker never landed, or the import committed
                remove_path(&path)?;
                report.cleaned += 1;
            }
        } else if name.starts_with(DISCARD_PREFIX)
            || name.starts_with(STAGING_PREFIX)
            || name.starts_with(INCOMING_PREFIX)
        {
            tracing::debug!(path = %path.display(), "Removing leftover work entry");
            remove_path(&path)?;
            report.cleaned += 1;
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::create_rollback_point;
    use tempfile::TempDir;

    fn seeded_layout(temp: &TempDir) -> DataLayout {
        let layout = DataLayout::new(temp.path());
        layout.ensure_dirs().unwrap();
        fs::write(&layout.database, b"original-db").unwrap();
        fs::write(layout.uploads.join("a.jpg"), b"0123456789").unwrap();
        layout
    }

    #[test]
    fn test_recover_restores_interrupted_import() {
        let temp = TempDir::new().unwrap();
        let layout = seeded_layout(&temp);

        // Import got as far as installing new files, then the process died
        let _point = create_rollback_point(&layout, &mut || Ok(())).unwrap();
        fs::write(&layout.database, b"half-imported").unwrap();
        fs::create_dir_all(&layout.uploads).unwrap();
        fs::write(layout.uploads.join("z.jpg"), b"z").unwrap();

        let report = recover_interrupted_imports(&layout).unwrap();
        assert_eq!(report.restored, 1);
        assert_eq!(fs::read(&layout.database).unwrap(), b"original-db");
        assert_eq!(fs::read(layout.uploads.join("a.jpg")).unwrap(), b"0123456789");
        assert!(!layout.uploads.join("z.jpg").exists());
    }

    #[test]
    fn test_recover_when_only_database_was_parked() {
        let temp = TempDir::new().unwrap();
        let layout = seeded_layout(&temp);

        // Hand-build a point where the crash hit between the two moves
        let marker = RollbackMarker::new(true, Vec::new());
        let dir = layout.work.join(format!("{ROLLBACK_PREFIX}{}", marker.id));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(MARKER_FILE), serde_json::to_vec(&marker).unwrap()).unwrap();
        fs::rename(&layout.database, dir.join("store.db")).unwrap();

        let report = recover_interrupted_imports(&layout).unwrap();
        assert_eq!(report.restored, 1);
        assert_eq!(fs::read(&layout.database).unwrap(), b"original-db");
        assert!(layout.uploads.join("a.jpg").exists());
        assert!(!dir.exists());
    }

    #[test]
    fn test_recover_cleans_leftovers() {
        let temp = TempDir::new().unwrap();
        let layout = seeded_layout(&temp);
        fs::create_dir_all(layout.work.join(format!("{STAGING_PREFIX}abc"))).unwrap();
        fs::create_dir_all(layout.work.join(format!("{DISCARD_PREFIX}abc"))).unwrap();
        fs::write(layout.work.join(format!("{INCOMING_PREFIX}abc.zip")), b"zip").unwrap();
        fs::create_dir_all(layout.work.join(format!("{ROLLBACK_PREFIX}nomarker"))).unwrap();

        let report = recover_interrupted_imports(&layout).unwrap();
        assert_eq!(report, RecoveryReport { restored: 0, cleaned: 4 });
        assert_eq!(fs::read_dir(&layout.work).unwrap().count(), 0);
        assert_eq!(fs::read(&layout.database).unwrap(), b"original-db");
    }

    #[test]
    fn test_recover_without_work_dir() {
        let temp = TempDir::new().unwrap();
        let layout = DataLayout::new(&temp.path().join("fresh"));
        assert_eq!(
            recover_interrupted_imports(&layout).unwrap(),
            RecoveryReport::default()
        );
    }
}
