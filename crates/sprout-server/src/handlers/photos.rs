//! Photo handlers.

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath};
use crate::handlers::projects::project_not_found;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use sprout_core::photo::{NewPhoto, Photo, PhotoUpdate};
use sprout_core::storage::{PhotoStore, ProjectStore};
use sprout_core::upload::generate_filename;
use sprout_core::util::validate_file_name;
use std::path::Path;

/// GET /api/projects/{id}/photos
pub async fn list_photos(
    State(state): State<AppState>,
    ApiPath(project_id): ApiPath<i64>,
) -> ApiResult<Json<Vec<Photo>>> {
    let photos = state.store.with_db(|db| -> ApiResult<_> {
        if ProjectStore::new(db.connection()).get(project_id)?.is_none() {
            return Err(project_not_found(project_id));
        }
        Ok(PhotoStore::new(db.connection()).list_for_project(project_id)?)
    })?;
    Ok(Json(photos))
}

/// Parsed `multipart/form-data` body of a photo upload.
struct PhotoForm {
    original_name: Option<String>,
    content: Bytes,
    taken_at: Option<DateTime<Utc>>,
    caption: Option<String>,
}

async fn read_photo_form(mut multipart: Multipart, max_bytes: usize) -> ApiResult<PhotoForm> {
    let mut photo = None;
    let mut taken_at = None;
    let mut caption = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "photo" => {
                let original_name = field.file_name().map(str::to_string);
                let content = field.bytes().await?;
                photo = Some((original_name, content));
            }
            "taken_at" => {
                let text = field.text().await?;
                let parsed = DateTime::parse_from_rfc3339(text.trim()).map_err(|e| {
                    ApiError::BadRequest(format!("taken_at must be RFC 3339: {e}"))
                })?;
                taken_at = Some(parsed.with_timezone(&Utc));
            }
            "caption" => {
                let text = field.text().await?;
                caption = Some(text).filter(|c| !c.trim().is_empty());
            }
            other => tracing::debug!(field = %other, "Ignoring unknown upload field"),
        }
    }

    let (original_name, content) =
        photo.ok_or_else(|| ApiError::BadRequest("a photo file is required".to_string()))?;
    if content.is_empty() {
        return Err(ApiError::BadRequest("photo file is empty".to_string()));
    }
    if content.len() > max_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "photo is larger than {max_bytes} bytes"
        )));
    }

    Ok(PhotoForm {
        original_name,
        content,
        taken_at,
        caption,
    })
}

/// POST /api/projects/{id}/photos
///
/// The file is written and the row inserted under the store gate, so an
/// import never sees one without the other.
pub async fn upload_photo(
    State(state): State<AppState>,
    ApiPath(project_id): ApiPath<i64>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<Photo>)> {
    let form = read_photo_form(multipart?, state.config.server.max_photo_bytes()).await?;
    let uploads = state.layout.uploads.clone();

    let photo = state.store.with_db(|db| -> ApiResult<_> {
        let projects = ProjectStore::new(db.connection());
        if projects.get(project_id)?.is_none() {
            return Err(project_not_found(project_id));
        }

        let filename = generate_filename(form.original_name.as_deref());
        validate_file_name(&filename).map_err(|e| ApiError::Internal(e.to_string()))?;
        let path = uploads.join(&filename);
        std::fs::write(&path, &form.content)
            .map_err(|e| ApiError::Internal(format!("writing {}: {e}", path.display())))?;

        let new = NewPhoto {
            project_id,
            filename,
            taken_at: form.taken_at.unwrap_or_else(Utc::now),
            caption: form.caption,
        };
        let photo = match PhotoStore::new(db.connection()).create(&new) {
            Ok(photo) => photo,
            Err(e) => {
                remove_upload(&uploads, &new.filename);
                return Err(e.into());
            }
        };
        // Row and file are already committed
        if let Err(e) = projects.touch(project_id) {
            tracing::warn!(project_id, error = %e, "Failed to touch project after upload");
        }
        Ok(photo)
    })?;

    tracing::info!(
        photo_id = photo.id,
        project_id,
        filename = %photo.filename,
        size = form.content.len(),
        "Photo uploaded"
    );
    Ok((StatusCode::CREATED, Json(photo)))
}

/// PUT /api/photos/{id}
pub async fn update_photo(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<PhotoUpdate>,
) -> ApiResult<Json<Photo>> {
    let photo = state
        .store
        .with_db(|db| Ok::<_, ApiError>(PhotoStore::new(db.connection()).update(id, &req)?))?
        .ok_or_else(|| photo_not_found(id))?;
    Ok(Json(photo))
}

/// DELETE /api/photos/{id}
pub async fn delete_photo(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    let uploads = state.layout.uploads.clone();
    state.store.with_db(|db| -> ApiResult<_> {
        let photo = PhotoStore::new(db.connection())
            .delete(id)?
            .ok_or_else(|| photo_not_found(id))?;
        remove_upload(&uploads, &photo.filename);
        Ok(())
    })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Remove an upload file. A missing or unremovable file is logged, not
/// fatal: the row is already gone.
pub(crate) fn remove_upload(uploads: &Path, filename: &str) {
    if let Err(e) = validate_file_name(filename) {
        tracing::warn!(filename = %filename, error = %e, "Refusing to remove oddly named upload");
        return;
    }
    match std::fs::remove_file(uploads.join(filename)) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(filename = %filename, "Upload file already gone");
        }
        Err(e) => tracing::warn!(filename = %filename, error = %e, "Failed to remove upload file"),
    }
}

fn photo_not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("photo {id}"))
}
