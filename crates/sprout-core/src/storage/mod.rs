//! Storage layer (`SQLite` + upload directory)

pub mod db;
pub mod handle;
pub mod migrations;
pub mod photos;
pub mod projects;

pub use db::{Database, DatabaseError, StoreSummary};
pub use handle::{QuiescedStore, StoreError, StoreHandle, StoreState};
pub use photos::PhotoStore;
pub use projects::ProjectStore;

use chrono::{DateTime, SecondsFormat, Utc};

/// Fixed-width RFC 3339 so text ordering matches time ordering
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::InvalidData(format!("Invalid datetime {value:?}: {e}")))
}
