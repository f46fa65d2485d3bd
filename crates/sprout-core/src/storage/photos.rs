//! Photo storage operations (CRUD)

use crate::photo::{NewPhoto, Photo, PhotoUpdate};
use crate::storage::db::DatabaseError;
use crate::storage::{format_timestamp, parse_timestamp};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

const PHOTO_COLUMNS: &str = "id, project_id, filename, taken_at, caption, created_at";

/// Photo storage operations
pub struct PhotoStore<'a> {
    conn: &'a Connection,
}

impl<'a> PhotoStore<'a> {
    /// Create a new photo store
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a photo row
    ///
    /// # Errors
    /// Returns an error if the row cannot be inserted (unknown project,
    /// duplicate filename)
    pub fn create(&self, new: &NewPhoto) -> Result<Photo, DatabaseError> {
        self.conn.execute(
            r"
            INSERT INTO photos (project_id, filename, taken_at, caption, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                new.project_id,
                new.filename,
                format_timestamp(new.taken_at),
                new.caption,
                format_timestamp(Utc::now()),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.get(id)?
            .ok_or_else(|| DatabaseError::InvalidData(format!("Photo {id} vanished after insert")))
    }

    /// Get a photo by ID
    ///
    /// # Errors
    /// Returns an error if the photo cannot be retrieved
    pub fn get(&self, id: i64) -> Result<Option<Photo>, DatabaseError> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = ?1"),
                params![id],
                RawPhoto::from_row,
            )
            .optional()?;

        raw.map(RawPhoto::into_photo).transpose()
    }

    /// List a project's photos in the order they were taken
    ///
    /// # Errors
    /// Returns an error if the photos cannot be listed
    pub fn list_for_project(&self, project_id: i64) -> Result<Vec<Photo>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE project_id = ?1 ORDER BY taken_at, id"
        ))?;

        let rows = stmt.query_map(params![project_id], RawPhoto::from_row)?;

        let mut photos = Vec::new();
        for row in rows {
            photos.push(row?.into_photo()?);
        }
        Ok(photos)
    }

    /// Apply a partial update, returning the updated photo
    ///
    /// # Errors
    /// Returns an error if the photo cannot be updated
    pub fn update(&self, id: i64, update: &PhotoUpdate) -> Result<Option<Photo>, DatabaseError> {
        let updated = self.conn.execute(
            r"
            UPDATE photos
            SET caption = COALESCE(?1, caption),
                taken_at = COALESCE(?2, taken_at)
            WHERE id = ?3
            ",
            params![update.caption, update.taken_at.map(format_timestamp), id],
        )?;

        if updated == 0 {
            return Ok(None);
        }

        self.get(id)
    }

    /// Delete a photo row, returning it so the caller can remove its file
    ///
    /// # Errors
    /// Returns an error if the photo cannot be deleted
    pub fn delete(&self, id: i64) -> Result<Option<Photo>, DatabaseError> {
        let Some(photo) = self.get(id)? else {
            return Ok(None);
        };

        self.conn
            .execute("DELETE FROM photos WHERE id = ?1", params![id])?;

        Ok(Some(photo))
    }

    /// Filenames of a project's photos (used before a cascading delete)
    ///
    /// # Errors
    /// Returns an error if the query fails
    pub fn filenames_for_project(&self, project_id: i64) -> Result<Vec<String>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT filename FROM photos WHERE project_id = ?1 ORDER BY filename")?;
        let names = stmt
            .query_map(params![project_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Every filename referenced by any photo, sorted
    ///
    /// # Errors
    /// Returns an error if the query fails
    pub fn all_filenames(&self) -> Result<Vec<String>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT filename FROM photos ORDER BY filename")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }
}

struct RawPhoto {
    id: i64,
    project_id: i64,
    filename: String,
    taken_at: String,
    caption: Option<String>,
    created_at: String,
}

impl RawPhoto {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            filename: row.get(2)?,
            taken_at: row.get(3)?,
            caption: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn into_photo(self) -> Result<Photo, DatabaseError> {
        Ok(Photo {
            id: self.id,
            project_id: self.project_id,
            filename: self.filename,
            taken_at: parse_timestamp(&self.taken_at)?,
            caption: self.caption,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}
