//! Rollback points protecting the live store during import

pub mod create;
pub mod restore;
pub mod types;

pub use create::{create_rollback_point, disarm_rollback_point, discard_rollback_point};
pub use restore::{recover_interrupted_imports, restore_rollback_point};
pub use types::{RecoveryReport, RollbackMarker, RollbackPoint};

use thiserror::Error;

/// Work-area directory prefix for rollback points
pub const ROLLBACK_PREFIX: &str = "rollback-";
/// Work-area prefix for rollback points being deleted after a commit
pub const DISCARD_PREFIX: &str = "discard-";
/// Work-area prefix for extracted archives awaiting install
pub const STAGING_PREFIX: &str = "staging-";
/// Work-area prefix for uploaded archives awaiting import
pub const INCOMING_PREFIX: &str = "incoming-";

/// Marker file inside a rollback directory
pub const MARKER_FILE: &str = "rollback.json";

/// Database sidecar suffixes SQLite may leave next to the main file
pub const SIDECAR_SUFFIXES: [&str; 3] = ["-journal", "-wal", "-shm"];

/// Errors while creating, restoring, or discarding a rollback point
#[derive(Error, Debug)]
pub enum RollbackError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid rollback marker: {0}")]
    Marker(#[from] serde_json::Error),
}
