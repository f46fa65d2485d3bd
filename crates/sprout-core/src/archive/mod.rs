//! Backup archives: export the store to a zip, import one back
//!
//! Layout of an archive:
//!
//! ```text
//! manifest.json      format version and SHA-256 of every entry
//! store.db           the SQLite file, verbatim
//! uploads/<name>     one entry per upload file, verbatim
//! ```

pub mod export;
pub mod import;
pub mod manifest;
pub mod staging;

pub use export::{export_archive, ExportError, ExportedArchive};
pub use import::{import_archive, ImportError, ImportOptions, ImportReport, ImportStage};
pub use manifest::{ArchiveManifest, EntryDigest, FORMAT_VERSION};
pub use staging::StagedArchive;

/// Archive entry holding the database file
pub const DATABASE_ENTRY: &str = "store.db";
/// Prefix of archive entries holding upload files
pub const UPLOADS_PREFIX: &str = "uploads/";
/// Archive entry holding the manifest
pub const MANIFEST_ENTRY: &str = "manifest.json";
