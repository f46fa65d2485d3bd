//! Configuration types shared by the server and the CLI

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the database file inside the data directory
pub const DATABASE_FILE: &str = "store.db";
/// Name of the upload directory inside the data directory
pub const UPLOADS_DIR: &str = "uploads";
/// Private work area for staging, rollback points, and temporary archives
pub const WORK_DIR: &str = ".work";

/// Top-level application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

/// HTTP server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Largest accepted backup archive upload, in MiB.
    #[serde(default = "default_max_archive_mb")]
    pub max_archive_mb: u64,
    /// Largest accepted photo upload, in MiB.
    #[serde(default = "default_max_photo_mb")]
    pub max_photo_mb: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_archive_mb: default_max_archive_mb(),
            max_photo_mb: default_max_photo_mb(),
        }
    }
}

impl ServerConfig {
    /// Request body limit for archive imports, in bytes
    #[must_use]
    pub fn max_archive_bytes(&self) -> usize {
        mib_to_bytes(self.max_archive_mb)
    }

    /// Request body limit for photo uploads, in bytes
    #[must_use]
    pub fn max_photo_bytes(&self) -> usize {
        mib_to_bytes(self.max_photo_mb)
    }
}

/// Where persistent state lives.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data root, relative to the working directory unless absolute.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl StorageConfig {
    /// Resolve the fixed file layout under the data root
    #[must_use]
    pub fn layout(&self) -> DataLayout {
        DataLayout::new(&self.data_dir)
    }
}

/// Import tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Upper bound on how long the store may stay quiesced while files are
    /// swapped.
    #[serde(default = "default_quiesce_timeout_secs")]
    pub quiesce_timeout_secs: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            quiesce_timeout_secs: default_quiesce_timeout_secs(),
        }
    }
}

impl ImportConfig {
    #[must_use]
    pub fn quiesce_timeout(&self) -> Duration {
        Duration::from_secs(self.quiesce_timeout_secs)
    }
}

/// Process-wide file layout
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataLayout {
    /// Data root
    pub root: PathBuf,
    /// Live database file
    pub database: PathBuf,
    /// Live upload directory
    pub uploads: PathBuf,
    /// Work area (same filesystem as the live files, so moves are renames)
    pub work: PathBuf,
}

impl DataLayout {
    /// Build the layout rooted at `root`
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            database: root.join(DATABASE_FILE),
            uploads: root.join(UPLOADS_DIR),
            work: root.join(WORK_DIR),
        }
    }

    /// Create the data root, upload directory, and work area
    ///
    /// # Errors
    /// Returns an error if a directory cannot be created
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(&self.uploads)?;
        std::fs::create_dir_all(&self.work)?;
        Ok(())
    }
}

fn mib_to_bytes(mib: u64) -> usize {
    usize::try_from(mib.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX)
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_archive_mb() -> u64 {
    1024
}

fn default_max_photo_mb() -> u64 {
    50
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_quiesce_timeout_secs() -> u64 {
    120
}
