//! Taking and discarding rollback points

use super::{
    restore_rollback_point, RollbackError, RollbackMarker, RollbackPoint, DISCARD_PREFIX,
    MARKER_FILE, ROLLBACK_PREFIX, SIDECAR_SUFFIXES,
};
use crate::backup::types::live_sidecar;
use crate::config::DataLayout;
use crate::util::{move_path, remove_path};
use std::fs;
use std::io;

/// Park the live database (with sidecars) and upload directory in a fresh
/// rollback directory under the work area.
///
/// The marker is written before anything moves, so a crash at any point
/// leaves enough on disk for [`super::recover_interrupted_imports`]. If
/// parking fails half way, whatever was already moved is put back before
/// the error is returned.
///
/// The store must be quiesced.
///
/// # Errors
/// Returns an error if the directory, marker, or any move fails
pub fn create_rollback_point<F>(
    layout: &DataLayout,
    check: &mut F,
) -> Result<RollbackPoint, RollbackError>
where
    F: FnMut() -> io::Result<()>,
{
    fs::create_dir_all(&layout.work)?;

    let sidecars = SIDECAR_SUFFIXES
        .iter()
        .filter(|suffix| live_sidecar(&layout.database, suffix).exists())
        .map(|suffix| (*suffix).to_string())
        .collect();
    let marker = RollbackMarker::new(layout.uploads.exists(), sidecars);

    let dir = layout.work.join(format!("{ROLLBACK_PREFIX}{}", marker.id));
    fs::create_dir(&dir)?;

    // Marker goes in atomically: absent or complete
    let marker_tmp = dir.join(format!("{MARKER_FILE}.tmp"));
    fs::write(&marker_tmp, serde_json::to_vec_pretty(&marker)?)?;
    fs::rename(&marker_tmp, dir.join(MARKER_FILE))?;

    let point = RollbackPoint { dir, marker };

    if let Err(e) = park(&point, layout, check) {
        tracing::warn!(error = %e, "Parking live data failed, putting it back");
        restore_rollback_point(&point, layout)?;
        return Err(e.into());
    }

    tracing::info!(
        rollback = %point.dir.display(),
        had_uploads = point.marker.had_uploads,
        "Rollback point created"
    );
    Ok(point)
}

fn park<F>(point: &RollbackPoint, layout: &DataLayout, check: &mut F) -> io::Result<()>
where
    F: FnMut() -> io::Result<()>,
{
    move_path(&layout.database, &point.database_path(), check)?;

    for suffix in &point.marker.sidecars {
        move_path(
            &live_sidecar(&layout.database, suffix),
            &point.sidecar_path(suffix),
            check,
        )?;
    }

    if point.marker.had_uploads {
        move_path(&layout.uploads, &point.uploads_path(), check)?;
    }

    Ok(())
}

/// Remove the marker so startup recovery no longer restores this point.
///
/// This is the commit of an import: once it returns, a crash keeps the
/// imported data and the leftover directory is swept at startup.
///
/// # Errors
/// Returns an error if the marker cannot be removed
pub fn disarm_rollback_point(point: &RollbackPoint) -> Result<(), RollbackError> {
    remove_path(&point.dir.join(MARKER_FILE))?;
    tracing::debug!(rollback = %point.dir.display(), "Rollback point disarmed");
    Ok(())
}

/// Drop a rollback point after the import committed.
///
/// The directory is renamed out of the `rollback-` namespace first so a
/// crash mid-delete is never mistaken for an interrupted import.
///
/// # Errors
/// Returns an error if the rename or delete fails
pub fn discard_rollback_point(point: RollbackPoint, layout: &DataLayout) -> Result<(), RollbackError> {
    let doomed = layout
        .work
        .join(format!("{DISCARD_PREFIX}{}", point.marker.id));
    fs::rename(&point.dir, &doomed)?;
    remove_path(&doomed)?;
    Ok(())
}
