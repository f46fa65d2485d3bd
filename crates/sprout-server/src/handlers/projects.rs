//! Project handlers.

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use sprout_core::project::{NewProject, Project, ProjectStatus, ProjectSummary, ProjectUpdate};
use sprout_core::storage::{PhotoStore, ProjectStore};

use super::photos::remove_upload;

/// Query parameters for listing projects.
#[derive(Debug, Deserialize)]
pub struct ListProjectsQuery {
    pub status: Option<ProjectStatus>,
}

/// GET /api/projects
pub async fn list_projects(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListProjectsQuery>,
) -> ApiResult<Json<Vec<ProjectSummary>>> {
    let projects = state
        .store
        .with_db(|db| Ok::<_, ApiError>(ProjectStore::new(db.connection()).list(query.status)?))?;
    Ok(Json(projects))
}

/// POST /api/projects
pub async fn create_project(
    State(state): State<AppState>,
    ApiJson(mut req): ApiJson<NewProject>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    req.name = required_name(&req.name)?;

    let project = state
        .store
        .with_db(|db| Ok::<_, ApiError>(ProjectStore::new(db.connection()).create(&req)?))?;

    tracing::info!(project_id = project.id, name = %project.name, "Project created");
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /api/projects/{id}
pub async fn get_project(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Project>> {
    let project = state
        .store
        .with_db(|db| Ok::<_, ApiError>(ProjectStore::new(db.connection()).get(id)?))?
        .ok_or_else(|| project_not_found(id))?;
    Ok(Json(project))
}

/// PUT /api/projects/{id}
pub async fn update_project(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(mut req): ApiJson<ProjectUpdate>,
) -> ApiResult<Json<Project>> {
    if let Some(name) = &req.name {
        req.name = Some(required_name(name)?);
    }

    let project = state
        .store
        .with_db(|db| Ok::<_, ApiError>(ProjectStore::new(db.connection()).update(id, &req)?))?
        .ok_or_else(|| project_not_found(id))?;
    Ok(Json(project))
}

/// DELETE /api/projects/{id}
///
/// Photo rows cascade; their files are removed while the gate is still held
/// so an import cannot swap the upload directory in between.
pub async fn delete_project(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    let uploads = state.layout.uploads.clone();
    state.store.with_db(|db| -> ApiResult<_> {
        let filenames = PhotoStore::new(db.connection()).filenames_for_project(id)?;
        if !ProjectStore::new(db.connection()).delete(id)? {
            return Err(project_not_found(id));
        }
        for filename in &filenames {
            remove_upload(&uploads, filename);
        }
        tracing::info!(project_id = id, photos = filenames.len(), "Project deleted");
        Ok(())
    })?;

    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn project_not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("project {id}"))
}

fn required_name(name: &str) -> ApiResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest("project name is required".to_string()));
    }
    Ok(trimmed.to_string())
}
