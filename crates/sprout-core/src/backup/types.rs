//! Rollback point types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Marker written into a rollback directory before anything is moved into it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackMarker {
    /// Unique identifier (also part of the directory name)
    pub id: Uuid,
    /// When the rollback point was taken
    pub created_at: DateTime<Utc>,
    /// Whether a live upload directory existed
    pub had_uploads: bool,
    /// Database sidecar suffixes (`-journal`, `-wal`, `-shm`) that existed
    #[serde(default)]
    pub sidecars: Vec<String>,
}

impl RollbackMarker {
    /// Describe the live state about to be parked
    #[must_use]
    pub fn new(had_uploads: bool, sidecars: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            had_uploads,
            sidecars,
        }
    }
}

/// The pre-import database and upload directory, parked in the work area
#[derive(Debug)]
pub struct RollbackPoint {
    /// Directory holding the parked files
    pub dir: PathBuf,
    /// What was parked
    pub marker: RollbackMarker,
}

impl RollbackPoint {
    /// Parked copy of the database file
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.dir.join(crate::config::DATABASE_FILE)
    }

    /// Parked copy of the upload directory
    #[must_use]
    pub fn uploads_path(&self) -> PathBuf {
        self.dir.join(crate::config::UPLOADS_DIR)
    }

    /// Parked copy of one database sidecar
    #[must_use]
    pub fn sidecar_path(&self, suffix: &str) -> PathBuf {
        self.dir
            .join(format!("{}{suffix}", crate::config::DATABASE_FILE))
    }
}

/// Live path of a database sidecar file
#[must_use]
pub fn live_sidecar(database: &Path, suffix: &str) -> PathBuf {
    let mut name = database.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// What startup recovery found in the work area
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Interrupted imports whose rollback point was restored
    pub restored: usize,
    /// Leftover staging, discard, and temporary entries removed
    pub cleaned: usize,
}
