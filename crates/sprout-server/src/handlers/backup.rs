//! Backup export and import handlers.
//!
//! Both run the core work on the blocking pool: export reads files and
//! builds the zip in memory, import extracts, verifies, and moves files.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::header::{self, HeaderName};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use sprout_core::backup::INCOMING_PREFIX;
use sprout_core::{export_archive, import_archive, ImportOptions, ImportReport};
use std::io::Write;
use tempfile::NamedTempFile;

/// Response header carrying how many referenced photo files were missing.
pub const MISSING_FILES_HEADER: HeaderName = HeaderName::from_static("x-sprout-missing-files");

/// Multipart field holding the archive.
const ARCHIVE_FIELD: &str = "archive";

/// GET /api/backup/export
pub async fn export_backup(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let store = state.store.clone();
    let layout = state.layout.clone();

    let exported = tokio::task::spawn_blocking(move || export_archive(&store, &layout))
        .await
        .map_err(|e| ApiError::Internal(format!("export task failed: {e}")))??;

    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", exported.file_name),
        ),
        (MISSING_FILES_HEADER, exported.missing_files().len().to_string()),
    ];
    Ok((headers, exported.bytes))
}

/// Import acknowledgement.
#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub report: ImportReport,
}

/// POST /api/backup/import
///
/// The upload is spooled to a temporary file in the work area, which is
/// deleted when the import finishes, whatever the outcome.
pub async fn import_backup(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<ImportResponse>> {
    // No multipart body at all means nothing was attached
    let multipart = multipart.map_err(|e| {
        tracing::debug!(error = %e, "Import request without a multipart body");
        ApiError::MissingArchive
    })?;
    let archive = receive_archive(multipart, &state).await?;

    let store = state.store.clone();
    let layout = state.layout.clone();
    let options = ImportOptions::from(&state.config.import);

    let report = tokio::task::spawn_blocking(move || {
        let result = import_archive(&store, &layout, archive.path(), &options);
        drop(archive);
        result
    })
    .await
    .map_err(|e| ApiError::Internal(format!("import task failed: {e}")))??;

    Ok(Json(ImportResponse {
        status: "ok",
        report,
    }))
}

/// Stream the single `archive` field to disk
async fn receive_archive(mut multipart: Multipart, state: &AppState) -> ApiResult<NamedTempFile> {
    let mut archive: Option<NamedTempFile> = None;

    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(ARCHIVE_FIELD) {
            tracing::debug!(field = ?field.name(), "Ignoring unknown import field");
            continue;
        }
        if archive.is_some() {
            return Err(ApiError::BadRequest(
                "exactly one archive file may be attached".to_string(),
            ));
        }

        std::fs::create_dir_all(&state.layout.work)
            .map_err(|e| ApiError::Internal(format!("creating work area: {e}")))?;
        let mut file = tempfile::Builder::new()
            .prefix(INCOMING_PREFIX)
            .suffix(".zip")
            .tempfile_in(&state.layout.work)
            .map_err(|e| ApiError::Internal(format!("creating temporary archive: {e}")))?;

        let mut size = 0usize;
        while let Some(chunk) = field.chunk().await? {
            size += chunk.len();
            file.write_all(&chunk)
                .map_err(|e| ApiError::Internal(format!("writing temporary archive: {e}")))?;
        }
        if size == 0 {
            return Err(ApiError::MissingArchive);
        }

        tracing::info!(size, "Backup archive received");
        archive = Some(file);
    }

    archive.ok_or(ApiError::MissingArchive)
}
