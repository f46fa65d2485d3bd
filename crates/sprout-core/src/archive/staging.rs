//! Extract and validate an archive before the live store is touched

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zip::read::ZipFile;
use zip::ZipArchive;

use super::import::{ImportError, ImportStage};
use super::manifest::{ArchiveManifest, EntryDigest, FORMAT_VERSION};
use super::{DATABASE_ENTRY, MANIFEST_ENTRY, UPLOADS_PREFIX};
use crate::backup::STAGING_PREFIX;
use crate::config::{DATABASE_FILE, UPLOADS_DIR};
use crate::storage::{Database, StoreSummary};
use crate::util::{safe_join, PathError};

/// An archive extracted into the work area and checked for integrity.
///
/// The staging directory is removed when this value is dropped, whether or
/// not its files were installed.
#[derive(Debug)]
pub struct StagedArchive {
    dir: TempDir,
    manifest: Option<ArchiveManifest>,
    summary: StoreSummary,
    uploads: BTreeMap<String, EntryDigest>,
    missing_files: Vec<String>,
}

impl StagedArchive {
    /// Extract `archive_path` into a fresh staging directory under
    /// `work_dir` and validate it:
    ///
    /// - the file must be a zip archive with exactly one `store.db`
    /// - entry paths must stay inside the staging directory
    /// - if a manifest is present, every digest must match
    /// - `store.db` must be an intact photo journal database no newer than
    ///   this build understands
    ///
    /// # Errors
    /// Returns a user error for any archive problem, or
    /// [`ImportError::Aborted`] if staging files cannot be written
    pub fn extract(archive_path: &Path, work_dir: &Path) -> Result<Self, ImportError> {
        let file = fs::File::open(archive_path)
            .map_err(|e| ImportError::aborted(ImportStage::Validate, e))?;
        let mut zip =
            ZipArchive::new(file).map_err(|e| ImportError::InvalidArchive(e.to_string()))?;

        fs::create_dir_all(work_dir).map_err(|e| ImportError::aborted(ImportStage::Stage, e))?;
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(work_dir)
            .map_err(|e| ImportError::aborted(ImportStage::Stage, e))?;
        let uploads_root = dir.path().join(UPLOADS_DIR);
        fs::create_dir(&uploads_root).map_err(|e| ImportError::aborted(ImportStage::Stage, e))?;

        let mut seen = HashSet::new();
        let mut database = None;
        let mut manifest_bytes = None;
        let mut uploads = BTreeMap::new();

        for index in 0..zip.len() {
            let mut entry = zip
                .by_index(index)
                .map_err(|e| ImportError::InvalidArchive(e.to_string()))?;
            let name = entry.name().to_string();

            if !seen.insert(name.clone()) {
                return Err(ImportError::InvalidArchive(format!("duplicate entry {name}")));
            }
            if entry.enclosed_name().is_none() {
                return Err(PathError::TraversalAttempt(name).into());
            }

            if name == DATABASE_ENTRY {
                let content = read_entry(&mut entry)?;
                write_staged(&dir.path().join(DATABASE_FILE), &content)?;
                database = Some(EntryDigest::of(DATABASE_ENTRY, &content));
            } else if name == MANIFEST_ENTRY {
                manifest_bytes = Some(read_entry(&mut entry)?);
            } else if let Some(relative) = name.strip_prefix(UPLOADS_PREFIX) {
                let relative = relative.trim_end_matches('/');
                if relative.is_empty() {
                    continue;
                }
                let target = safe_join(&uploads_root, Path::new(relative))?;
                if entry.is_dir() {
                    fs::create_dir_all(&target)
                        .map_err(|e| ImportError::aborted(ImportStage::Stage, e))?;
                    continue;
                }
                let content = read_entry(&mut entry)?;
                write_staged(&target, &content)?;
                uploads.insert(relative.to_string(), EntryDigest::of(relative, &content));
            } else {
                tracing::debug!(entry = %name, "Ignoring unrecognised archive entry");
            }
        }

        let database = database.ok_or(ImportError::MissingDatabase)?;

        let manifest = manifest_bytes
            .map(|bytes| parse_manifest(&bytes))
            .transpose()?;
        if let Some(manifest) = &manifest {
            verify_manifest(manifest, &database, &uploads)?;
        }

        let summary = Database::inspect(&dir.path().join(DATABASE_FILE)).map_err(|e| {
            ImportError::InvalidArchive(format!("{DATABASE_ENTRY} is not a usable journal database: {e}"))
        })?;

        let missing_files: Vec<String> = summary
            .filenames
            .iter()
            .filter(|name| !uploads.contains_key(name.as_str()))
            .cloned()
            .collect();

        Ok(Self {
            dir,
            manifest,
            summary,
            uploads,
            missing_files,
        })
    }

    /// Staged database file
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.dir.path().join(DATABASE_FILE)
    }

    /// Staged upload directory
    #[must_use]
    pub fn uploads_path(&self) -> PathBuf {
        self.dir.path().join(UPLOADS_DIR)
    }

    /// Manifest, if the archive carried one (digests already verified)
    #[must_use]
    pub fn manifest(&self) -> Option<&ArchiveManifest> {
        self.manifest.as_ref()
    }

    /// What the staged database contains
    #[must_use]
    pub fn summary(&self) -> &StoreSummary {
        &self.summary
    }

    /// Number of upload files staged
    #[must_use]
    pub fn upload_count(&self) -> usize {
        self.uploads.len()
    }

    /// Photo filenames in the staged database with no staged upload file
    #[must_use]
    pub fn missing_files(&self) -> &[String] {
        &self.missing_files
    }
}

fn read_entry(entry: &mut ZipFile<'_>) -> Result<Vec<u8>, ImportError> {
    let mut content = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
    entry
        .read_to_end(&mut content)
        .map_err(|e| ImportError::InvalidArchive(format!("cannot read {}: {e}", entry.name())))?;
    Ok(content)
}

fn write_staged(path: &Path, content: &[u8]) -> Result<(), ImportError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ImportError::aborted(ImportStage::Stage, e))?;
    }
    fs::write(path, content).map_err(|e| ImportError::aborted(ImportStage::Stage, e))
}

fn parse_manifest(bytes: &[u8]) -> Result<ArchiveManifest, ImportError> {
    let manifest: ArchiveManifest = serde_json::from_slice(bytes)
        .map_err(|e| ImportError::InvalidArchive(format!("{MANIFEST_ENTRY} is malformed: {e}")))?;

    if manifest.format_version > FORMAT_VERSION {
        return Err(ImportError::InvalidArchive(format!(
            "archive format version {} is newer than supported version {FORMAT_VERSION}",
            manifest.format_version
        )));
    }

    Ok(manifest)
}

fn verify_manifest(
    manifest: &ArchiveManifest,
    database: &EntryDigest,
    uploads: &BTreeMap<String, EntryDigest>,
) -> Result<(), ImportError> {
    if !manifest.database.matches(database) {
        return Err(ImportError::IntegrityMismatch(DATABASE_ENTRY.to_string()));
    }

    let mut listed = HashSet::new();
    for expected in &manifest.uploads {
        listed.insert(expected.path.as_str());
        match uploads.get(&expected.path) {
            Some(actual) if expected.matches(actual) => {}
            _ => {
                return Err(ImportError::IntegrityMismatch(format!(
                    "{UPLOADS_PREFIX}{}",
                    expected.path
                )))
            }
        }
    }

    if let Some(extra) = uploads.keys().find(|path| !listed.contains(path.as_str())) {
        return Err(ImportError::IntegrityMismatch(format!("{UPLOADS_PREFIX}{extra}")));
    }

    Ok(())
}
