//! Archive manifest

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util::sha256_hex;

/// Version of the archive format written by this build
pub const FORMAT_VERSION: u32 = 1;

/// Describes an archive's content so import can verify it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    /// Format version for future compatibility
    pub format_version: u32,
    /// Version of the program that wrote the archive
    #[serde(default)]
    pub generator: String,
    /// When exported
    pub created_at: DateTime<Utc>,
    /// Digest of the database entry
    pub database: EntryDigest,
    /// Digests of upload entries, relative to `uploads/`, sorted by path
    #[serde(default)]
    pub uploads: Vec<EntryDigest>,
    /// Photo filenames with no file in the upload directory at export time
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_files: Vec<String>,
}

/// Size and SHA-256 of one archive entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDigest {
    pub path: String,
    pub size: u64,
    pub sha256: String,
}

impl EntryDigest {
    /// Digest `content` stored at `path`
    #[must_use]
    pub fn of(path: impl Into<String>, content: &[u8]) -> Self {
        Self {
            path: path.into(),
            size: content.len() as u64,
            sha256: sha256_hex(content),
        }
    }

    /// Whether another digest describes the same bytes
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.size == other.size && self.sha256.eq_ignore_ascii_case(&other.sha256)
    }
}

impl ArchiveManifest {
    /// Manifest for a freshly exported archive
    #[must_use]
    pub fn new(database: EntryDigest, uploads: Vec<EntryDigest>, missing_files: Vec<String>) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            generator: format!("sprout {}", env!("CARGO_PKG_VERSION")),
            created_at: Utc::now(),
            database,
            uploads,
            missing_files,
        }
    }
}
