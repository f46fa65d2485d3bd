//! Photo model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored image belonging to a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    /// Row identifier
    pub id: i64,
    /// Owning project
    pub project_id: i64,
    /// Generated file name inside the upload directory
    pub filename: String,
    /// When the photo was taken
    pub taken_at: DateTime<Utc>,
    /// Optional caption
    pub caption: Option<String>,
    /// When uploaded
    pub created_at: DateTime<Utc>,
}

/// Fields for a new photo row
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub project_id: i64,
    pub filename: String,
    pub taken_at: DateTime<Utc>,
    pub caption: Option<String>,
}

/// Partial update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhotoUpdate {
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub taken_at: Option<DateTime<Utc>>,
}
