//! Sprout Core - photo journal storage, store lifecycle, and backup archives
//!
//! This crate provides the `SQLite` store for projects and photos, the
//! gate that lets an import swap the store's files underneath a running
//! process, and zip export/import with rollback points.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

pub mod archive;
pub mod backup;
pub mod config;
pub mod photo;
pub mod project;
pub mod storage;
pub mod upload;
pub mod util;

pub use archive::{
    export_archive, import_archive, ExportError, ExportedArchive, ImportError, ImportOptions,
    ImportReport, ImportStage,
};
pub use backup::recover_interrupted_imports;
pub use config::{AppConfig, DataLayout};
pub use photo::Photo;
pub use project::{Project, ProjectStatus};
pub use storage::{StoreError, StoreHandle, StoreState};
