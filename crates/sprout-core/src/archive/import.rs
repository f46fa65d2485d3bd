//! Replacing the live store with the content of an archive
//!
//! Sequence, with the stage reported on failure:
//!
//! 1. `validate` / `stage`: extract into the work area and verify, while the
//!    store keeps serving requests
//! 2. `quiesce`: close the store; requests now get "unavailable"
//! 3. `snapshot`: park live files in a rollback point
//! 4. `install_database` / `install_uploads`: move staged files into place
//! 5. `reopen`: open the new database
//! 6. `commit`: disarm the rollback point, still before the reopened store
//!    takes requests
//!
//! Any failure from step 3 onwards restores the rollback point and reopens
//! the original store before the error is returned. Deleting the disarmed
//! rollback point afterwards is best effort; startup sweeps leftovers.

use std::fmt;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use super::staging::StagedArchive;
use crate::backup::{
    create_rollback_point, disarm_rollback_point, discard_rollback_point, restore_rollback_point,
    RollbackPoint,
};
use crate::config::{DataLayout, ImportConfig};
use crate::storage::{DatabaseError, QuiescedStore, StoreError, StoreHandle, StoreState};
use crate::util::{move_path, PathError};

/// Step of the import sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStage {
    Validate,
    Stage,
    Quiesce,
    Snapshot,
    InstallDatabase,
    InstallUploads,
    Reopen,
    Commit,
}

impl ImportStage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Stage => "stage",
            Self::Quiesce => "quiesce",
            Self::Snapshot => "snapshot",
            Self::InstallDatabase => "install_database",
            Self::InstallUploads => "install_uploads",
            Self::Reopen => "reopen",
            Self::Commit => "commit",
        }
    }
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors during import
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Not a valid backup archive: {0}")]
    InvalidArchive(String),

    #[error("Archive does not contain store.db")]
    MissingDatabase,

    #[error("Archive entry does not match its manifest: {0}")]
    IntegrityMismatch(String),

    #[error("Unsafe archive entry: {0}")]
    UnsafeEntry(#[from] PathError),

    #[error("Store is {0}, another import may be running")]
    Unavailable(StoreState),

    /// Failed, and the store was returned to its pre-import state
    #[error("Import failed during {stage}, previous data restored: {reason}")]
    Aborted { stage: ImportStage, reason: String },

    /// Failed, and the pre-import state could not be fully restored
    #[error("Import failed during {stage} and previous data could not be restored: {reason}")]
    Inconsistent { stage: ImportStage, reason: String },
}

impl ImportError {
    pub(crate) fn aborted(stage: ImportStage, reason: impl fmt::Display) -> Self {
        Self::Aborted {
            stage,
            reason: reason.to_string(),
        }
    }

    /// Whether the archive itself was at fault (as opposed to the server)
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArchive(_)
                | Self::MissingDatabase
                | Self::IntegrityMismatch(_)
                | Self::UnsafeEntry(_)
        )
    }

    /// Stage at which a server-side failure happened
    #[must_use]
    pub fn stage(&self) -> Option<ImportStage> {
        match self {
            Self::Aborted { stage, .. } | Self::Inconsistent { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Import tuning
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Longest time the store may stay quiesced before the import gives up
    pub quiesce_timeout: Duration,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self::from(&ImportConfig::default())
    }
}

impl From<&ImportConfig> for ImportOptions {
    fn from(config: &ImportConfig) -> Self {
        Self {
            quiesce_timeout: config.quiesce_timeout(),
        }
    }
}

/// Outcome of a successful import
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub projects: u64,
    pub photos: u64,
    pub uploads: usize,
    /// Photo filenames with no file in the imported upload directory
    pub missing_files: Vec<String>,
    /// Whether the archive carried a manifest that was checked
    pub manifest_verified: bool,
}

/// Bounds how long the store stays closed
struct Deadline {
    expires: Instant,
    timeout: Duration,
}

impl Deadline {
    fn start(timeout: Duration) -> Self {
        Self {
            expires: Instant::now() + timeout,
            timeout,
        }
    }

    fn check(&self) -> io::Result<()> {
        if Instant::now() >= self.expires {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("store quiesced for longer than {:?}", self.timeout),
            ));
        }
        Ok(())
    }
}

/// Replace the live database and upload directory with the content of the
/// archive at `archive_path`.
///
/// The upload directory is replaced wholesale: files not in the archive are
/// gone afterwards. On any error the store is left exactly as it was, unless
/// [`ImportError::Inconsistent`] is returned.
///
/// # Errors
/// Returns a user error if the archive is rejected (the store is never
/// closed in that case), [`ImportError::Unavailable`] if another import
/// holds the store, or [`ImportError::Aborted`] /
/// [`ImportError::Inconsistent`] for failures after quiescing
pub fn import_archive(
    handle: &StoreHandle,
    layout: &DataLayout,
    archive_path: &Path,
    options: &ImportOptions,
) -> Result<ImportReport, ImportError> {
    let staged = StagedArchive::extract(archive_path, &layout.work)?;
    tracing::info!(
        projects = staged.summary().projects,
        photos = staged.summary().photos,
        uploads = staged.upload_count(),
        manifest = staged.manifest().is_some(),
        "Archive staged"
    );
    for name in staged.missing_files() {
        tracing::warn!(filename = %name, "Imported photo has no upload file");
    }

    let mut quiesced = handle.quiesce().map_err(|e| match e {
        StoreError::Unavailable(state) => ImportError::Unavailable(state),
        StoreError::Database(e) => ImportError::aborted(ImportStage::Quiesce, e),
    })?;
    let deadline = Deadline::start(options.quiesce_timeout);
    let mut check = || deadline.check();

    let point = create_rollback_point(layout, &mut check)
        .map_err(|e| ImportError::aborted(ImportStage::Snapshot, e))?;

    if let Err(failure) = install(&staged, layout, &point, &mut quiesced, &deadline) {
        tracing::warn!(
            stage = %failure.stage,
            error = %failure.reason,
            "Import failed, restoring previous data"
        );
        return Err(roll_back(
            &point,
            layout,
            &mut quiesced,
            failure.stage,
            &failure.reason,
        ));
    }
    drop(quiesced);

    clean_up(point, layout);

    let report = ImportReport {
        projects: staged.summary().projects,
        photos: staged.summary().photos,
        uploads: staged.upload_count(),
        missing_files: staged.missing_files().to_vec(),
        manifest_verified: staged.manifest().is_some(),
    };
    tracing::info!(
        projects = report.projects,
        photos = report.photos,
        uploads = report.uploads,
        missing = report.missing_files.len(),
        "Backup archive imported"
    );
    Ok(report)
}

/// Why the install failed, and where
struct InstallFailure {
    stage: ImportStage,
    reason: String,
}

impl InstallFailure {
    fn new(stage: ImportStage, reason: impl fmt::Display) -> Self {
        Self {
            stage,
            reason: reason.to_string(),
        }
    }
}

impl From<DatabaseError> for InstallFailure {
    fn from(e: DatabaseError) -> Self {
        Self::new(ImportStage::Reopen, e)
    }
}

fn install(
    staged: &StagedArchive,
    layout: &DataLayout,
    point: &RollbackPoint,
    quiesced: &mut QuiescedStore<'_>,
    deadline: &Deadline,
) -> Result<(), InstallFailure> {
    let mut check = || deadline.check();

    check().map_err(|e| InstallFailure::new(ImportStage::InstallDatabase, e))?;
    move_path(&staged.database_path(), &layout.database, &mut check)
        .map_err(|e| InstallFailure::new(ImportStage::InstallDatabase, e))?;

    check().map_err(|e| InstallFailure::new(ImportStage::InstallUploads, e))?;
    move_path(&staged.uploads_path(), &layout.uploads, &mut check)
        .map_err(|e| InstallFailure::new(ImportStage::InstallUploads, e))?;

    // Requests must not reach the new store while a crash could still revert it
    quiesced.reopen_with(|| {
        disarm_rollback_point(point).map_err(|e| InstallFailure::new(ImportStage::Commit, e))
    })
}

fn roll_back(
    point: &RollbackPoint,
    layout: &DataLayout,
    quiesced: &mut QuiescedStore<'_>,
    stage: ImportStage,
    reason: &str,
) -> ImportError {
    if let Err(e) = restore_rollback_point(point, layout) {
        tracing::error!(
            stage = %stage,
            error = %e,
            rollback = %point.dir.display(),
            "Restoring previous data failed; it will be retried at next startup"
        );
        return ImportError::Inconsistent {
            stage,
            reason: format!("{reason}; restore failed: {e}"),
        };
    }

    if let Err(e) = quiesced.reopen() {
        tracing::error!(stage = %stage, error = %e, "Previous data restored but store did not reopen");
        return ImportError::Inconsistent {
            stage,
            reason: format!("{reason}; reopen after restore failed: {e}"),
        };
    }

    ImportError::Aborted {
        stage,
        reason: reason.to_string(),
    }
}

/// Delete a disarmed rollback point. A failure only leaves disk space
/// behind until the next startup.
fn clean_up(point: RollbackPoint, layout: &DataLayout) {
    let dir = point.dir.clone();
    if let Err(e) = discard_rollback_point(point, layout) {
        tracing::warn!(
            rollback = %dir.display(),
            error = %e,
            "Rollback point left behind after import"
        );
    }
}
