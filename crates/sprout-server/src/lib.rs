//! HTTP API server for the Sprout photo journal.
//!
//! This crate provides:
//! - Project and photo CRUD over the store handle
//! - Backup export as a zip download
//! - Backup import with quiesce, rollback point, and reopen

pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
