//! Project storage operations (CRUD)

use crate::project::{NewProject, Project, ProjectStatus, ProjectSummary, ProjectUpdate};
use crate::storage::db::DatabaseError;
use crate::storage::{format_timestamp, parse_timestamp};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

const PROJECT_COLUMNS: &str = "id, name, description, summary, status, created_at, updated_at";

/// Project storage operations
pub struct ProjectStore<'a> {
    conn: &'a Connection,
}

impl<'a> ProjectStore<'a> {
    /// Create a new project store
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new project
    ///
    /// # Errors
    /// Returns an error if the project cannot be created
    pub fn create(&self, new: &NewProject) -> Result<Project, DatabaseError> {
        let now = format_timestamp(Utc::now());

        self.conn.execute(
            r"
            INSERT INTO projects (name, description, summary, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ",
            params![
                new.name,
                new.description,
                new.summary,
                ProjectStatus::Active.as_str(),
                now,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.get(id)?
            .ok_or_else(|| DatabaseError::InvalidData(format!("Project {id} vanished after insert")))
    }

    /// Get a project by ID
    ///
    /// # Errors
    /// Returns an error if the project cannot be retrieved
    pub fn get(&self, id: i64) -> Result<Option<Project>, DatabaseError> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"),
                params![id],
                RawProject::from_row,
            )
            .optional()?;

        raw.map(RawProject::into_project).transpose()
    }

    /// List projects with their photo counts, newest first
    ///
    /// # Errors
    /// Returns an error if the projects cannot be listed
    pub fn list(&self, status: Option<ProjectStatus>) -> Result<Vec<ProjectSummary>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT p.id, p.name, p.description, p.summary, p.status, p.created_at, p.updated_at,
                   (SELECT COUNT(*) FROM photos ph WHERE ph.project_id = p.id)
            FROM projects p
            WHERE ?1 IS NULL OR p.status = ?1
            ORDER BY p.updated_at DESC, p.id DESC
            ",
        )?;

        let rows = stmt.query_map(params![status.map(ProjectStatus::as_str)], |row| {
            let raw = RawProject::from_row(row)?;
            let photo_count: u64 = row.get(7)?;
            Ok((raw, photo_count))
        })?;

        let mut projects = Vec::new();
        for row in rows {
            let (raw, photo_count) = row?;
            projects.push(ProjectSummary {
                project: raw.into_project()?,
                photo_count,
            });
        }

        Ok(projects)
    }

    /// Apply a partial update, returning the updated project
    ///
    /// # Errors
    /// Returns an error if the project cannot be updated
    pub fn update(&self, id: i64, update: &ProjectUpdate) -> Result<Option<Project>, DatabaseError> {
        let updated = self.conn.execute(
            r"
            UPDATE projects
            SET name = COALESCE(?1, name),
                description = COALESCE(?2, description),
                summary = COALESCE(?3, summary),
                status = COALESCE(?4, status),
                updated_at = ?5
            WHERE id = ?6
            ",
            params![
                update.name,
                update.description,
                update.summary,
                update.status.map(ProjectStatus::as_str),
                format_timestamp(Utc::now()),
                id,
            ],
        )?;

        if updated == 0 {
            return Ok(None);
        }

        self.get(id)
    }

    /// Bump `updated_at`, e.g. after a photo was added
    ///
    /// # Errors
    /// Returns an error if the row cannot be updated
    pub fn touch(&self, id: i64) -> Result<(), DatabaseError> {
        self.conn.execute(
            "UPDATE projects SET updated_at = ?1 WHERE id = ?2",
            params![format_timestamp(Utc::now()), id],
        )?;
        Ok(())
    }

    /// Delete a project; its photo rows cascade
    ///
    /// # Errors
    /// Returns an error if the project cannot be deleted
    pub fn delete(&self, id: i64) -> Result<bool, DatabaseError> {
        let deleted = self
            .conn
            .execute("DELETE FROM projects WHERE id = ?1", params![id])?;

        Ok(deleted > 0)
    }
}

/// Column values before timestamp/status parsing
struct RawProject {
    id: i64,
    name: String,
    description: Option<String>,
    summary: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
}

impl RawProject {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            summary: row.get(3)?,
            status: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn into_project(self) -> Result<Project, DatabaseError> {
        Ok(Project {
            id: self.id,
            name: self.name,
            description: self.description,
            summary: self.summary,
            status: self.status.parse().map_err(DatabaseError::InvalidData)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}
