//! Route configuration.

use crate::handlers;
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    // Archive uploads are the largest bodies we accept; photo size is
    // checked again in the handler
    let body_limit = state.config.server.max_archive_bytes();

    Router::new()
        // Health check (answers while the store is quiesced)
        .route("/api/health", get(handlers::health_check))
        // Projects
        .route(
            "/api/projects",
            get(handlers::list_projects).post(handlers::create_project),
        )
        .route(
            "/api/projects/{id}",
            get(handlers::get_project)
                .put(handlers::update_project)
                .delete(handlers::delete_project),
        )
        // Photos
        .route(
            "/api/projects/{id}/photos",
            get(handlers::list_photos).post(handlers::upload_photo),
        )
        .route(
            "/api/photos/{id}",
            put(handlers::update_photo).delete(handlers::delete_photo),
        )
        // Backup
        .route("/api/backup/export", get(handlers::export_backup))
        .route("/api/backup/import", post(handlers::import_backup))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
