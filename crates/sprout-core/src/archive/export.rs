//! Archive creation from the live store
//!
//! The database file is read while holding the store gate, so it is never
//! copied mid-write. Upload files are read afterwards without the gate: a
//! photo added during export may or may not make it into the archive.

use std::collections::BTreeSet;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::manifest::{ArchiveManifest, EntryDigest};
use super::{DATABASE_ENTRY, MANIFEST_ENTRY, UPLOADS_PREFIX};
use crate::config::DataLayout;
use crate::storage::{DatabaseError, PhotoStore, StoreError, StoreHandle};

/// Errors during archive creation
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Cannot read {}: {source}", path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<DatabaseError> for ExportError {
    fn from(e: DatabaseError) -> Self {
        Self::Store(StoreError::Database(e))
    }
}

/// A finished archive, fully in memory
#[derive(Debug)]
pub struct ExportedArchive {
    /// Suggested download name, e.g. `sprout-backup-20240501-101500.zip`
    pub file_name: String,
    /// Zip bytes
    pub bytes: Vec<u8>,
    /// What went into the archive
    pub manifest: ArchiveManifest,
}

impl ExportedArchive {
    /// Photo filenames with no matching upload file
    #[must_use]
    pub fn missing_files(&self) -> &[String] {
        &self.manifest.missing_files
    }
}

/// Build a backup archive of the database file and upload directory.
///
/// Nothing on disk is modified. The archive is assembled completely before
/// returning, so a failure never yields a truncated archive.
///
/// # Errors
/// Returns an error if the store is quiesced, or a source file or directory
/// cannot be read
pub fn export_archive(handle: &StoreHandle, layout: &DataLayout) -> Result<ExportedArchive, ExportError> {
    let (database, referenced) = handle.with_db(|db| -> Result<_, ExportError> {
        let bytes = fs::read(&layout.database).map_err(|source| ExportError::Source {
            path: layout.database.clone(),
            source,
        })?;
        let referenced = PhotoStore::new(db.connection()).all_filenames()?;
        Ok((bytes, referenced))
    })?;

    let uploads = read_uploads(&layout.uploads)?;

    let present: BTreeSet<&str> = uploads.iter().map(|(name, _)| name.as_str()).collect();
    let missing_files: Vec<String> = referenced
        .into_iter()
        .filter(|name| !present.contains(name.as_str()))
        .collect();
    for name in &missing_files {
        tracing::warn!(filename = %name, "Photo references a file missing from the upload directory");
    }

    let manifest = ArchiveManifest::new(
        EntryDigest::of(DATABASE_ENTRY, &database),
        uploads
            .iter()
            .map(|(name, content)| EntryDigest::of(name.clone(), content))
            .collect(),
        missing_files,
    );

    let bytes = write_zip(&manifest, &database, &uploads)?;
    let file_name = format!("sprout-backup-{}.zip", Utc::now().format("%Y%m%d-%H%M%S"));

    tracing::info!(
        file_name = %file_name,
        size = bytes.len(),
        uploads = uploads.len(),
        missing = manifest.missing_files.len(),
        "Backup archive exported"
    );

    Ok(ExportedArchive {
        file_name,
        bytes,
        manifest,
    })
}

/// Read every regular file under `dir` in sorted order, keyed by its
/// `/`-separated path relative to `dir`. Symlinks are skipped.
fn read_uploads(dir: &Path) -> Result<Vec<(String, Vec<u8>)>, ExportError> {
    let meta = fs::metadata(dir).map_err(|source| ExportError::Source {
        path: dir.to_path_buf(),
        source,
    })?;
    if !meta.is_dir() {
        return Err(ExportError::Source {
            path: dir.to_path_buf(),
            source: std::io::Error::other("not a directory"),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(std::io::Error::other)?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let content = fs::read(entry.path()).map_err(|source| ExportError::Source {
            path: entry.path().to_path_buf(),
            source,
        })?;
        files.push((name, content));
    }

    Ok(files)
}

fn write_zip(
    manifest: &ArchiveManifest,
    database: &[u8],
    uploads: &[(String, Vec<u8>)],
) -> Result<Vec<u8>, ExportError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    // Entries carry no export-time metadata; only the manifest's created_at changes
    let deflated = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);
    // Photos are already compressed
    let stored = FileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);

    zip.start_file(MANIFEST_ENTRY, deflated)?;
    zip.write_all(&serde_json::to_vec_pretty(manifest)?)?;

    zip.start_file(DATABASE_ENTRY, deflated)?;
    zip.write_all(database)?;

    // Keeps an empty upload directory representable
    zip.add_directory(UPLOADS_PREFIX, stored)?;
    for (name, content) in uploads {
        zip.start_file(format!("{UPLOADS_PREFIX}{name}"), stored)?;
        zip.write_all(content)?;
    }

    Ok(zip.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    #[test]
    fn test_export_lists_entries() {
        let temp = TempDir::new().unwrap();
        let layout = DataLayout::new(temp.path());
        layout.ensure_dirs().unwrap();
        let handle = StoreHandle::open(&layout.database).unwrap();
        fs::create_dir_all(layout.uploads.join("nested")).unwrap();
        fs::write(layout.uploads.join("b.jpg"), b"bbb").unwrap();
        fs::write(layout.uploads.join("nested/a.png"), b"aa").unwrap();

        let exported = export_archive(&handle, &layout).unwrap();
        assert!(exported.file_name.starts_with("sprout-backup-"));
        assert!(exported.missing_files().is_empty());

        let mut zip = ZipArchive::new(Cursor::new(exported.bytes)).unwrap();
        let mut names: Vec<_> = zip.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(
            names,
            ["manifest.json", "store.db", "uploads/", "uploads/b.jpg", "uploads/nested/a.png"]
        );

        let mut content = Vec::new();
        zip.by_name("uploads/nested/a.png")
            .unwrap()
            .read_to_end(&mut content)
            .unwrap();
        assert_eq!(content, b"aa");

        for i in 0..zip.len() {
            let entry = zip.by_index(i).unwrap();
            let modified = entry.last_modified();
            assert_eq!(
                (modified.year(), modified.month(), modified.day()),
                (1980, 1, 1),
                "{}",
                entry.name()
            );
        }
    }

    #[test]
    fn test_export_fails_without_upload_dir() {
        let temp = TempDir::new().unwrap();
        let layout = DataLayout::new(temp.path());
        let handle = StoreHandle::open(&layout.database).unwrap();

        let err = export_archive(&handle, &layout).unwrap_err();
        assert!(matches!(err, ExportError::Source { .. }));
    }

    #[test]
    fn test_export_rejected_while_quiesced() {
        let temp = TempDir::new().unwrap();
        let layout = DataLayout::new(temp.path());
        layout.ensure_dirs().unwrap();
        let handle = StoreHandle::open(&layout.database).unwrap();

        let _quiesced = handle.quiesce().unwrap();
        let err = export_archive(&handle, &layout).unwrap_err();
        assert!(matches!(err, ExportError::Store(StoreError::Unavailable(_))));
    }
}
