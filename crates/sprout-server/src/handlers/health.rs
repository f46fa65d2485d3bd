//! Health check.

use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use sprout_core::StoreState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Store lifecycle state: `open`, `closed`, or `reopening`.
    pub store: &'static str,
    pub version: &'static str,
}

/// GET /api/health
///
/// Always answers, even while an import has the store closed.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.store.state();
    Json(HealthResponse {
        status: if store == StoreState::Open { "ok" } else { "maintenance" },
        store: store.as_str(),
        version: env!("CARGO_PKG_VERSION"),
    })
}
