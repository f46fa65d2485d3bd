//! Database connection management

use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use thiserror::Error;

use super::migrations::{self, CURRENT_VERSION};

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

/// Database wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        // Rollback journal instead of WAL: every commit lands in the main
        // file, so backups can copy it verbatim.
        conn.pragma_update(None, "journal_mode", "DELETE")?;
        conn.pragma_update(None, "cache_size", "-10000")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;

        migrations::run_migrations(&conn)?;

        Ok(Self { conn })
    }

    /// Create an in-memory database (for testing)
    ///
    /// # Errors
    /// Returns an error if the database cannot be created
    pub fn in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the connection
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Close the connection, surfacing any error SQLite reports
    ///
    /// # Errors
    /// Returns the database back alongside the error if it could not close
    pub fn close(self) -> Result<(), (Self, DatabaseError)> {
        self.conn
            .close()
            .map_err(|(conn, e)| (Self { conn }, DatabaseError::Sqlite(e)))
    }

    /// Inspect a database file without modifying it.
    ///
    /// Checks integrity, schema version, and that the journal tables exist.
    ///
    /// # Errors
    /// Returns an error if the file is not a usable store
    pub fn inspect(path: &Path) -> Result<StoreSummary, DatabaseError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        let check: String = conn.query_row("PRAGMA quick_check", [], |row| row.get(0))?;
        if check != "ok" {
            return Err(DatabaseError::InvalidData(format!(
                "integrity check failed: {check}"
            )));
        }

        let schema_version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if schema_version > CURRENT_VERSION {
            return Err(DatabaseError::Migration(format!(
                "schema version {schema_version} is newer than supported version {CURRENT_VERSION}"
            )));
        }

        for table in ["projects", "photos"] {
            let exists: bool = conn.query_row(
                "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
                [table],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(DatabaseError::InvalidData(format!("missing table: {table}")));
            }
        }

        let projects: u64 = conn.query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))?;
        let photos: u64 = conn.query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))?;

        let mut stmt = conn.prepare("SELECT filename FROM photos ORDER BY filename")?;
        let filenames = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(StoreSummary {
            schema_version,
            projects,
            photos,
            filenames,
        })
    }
}

/// What a database file contains, as seen by [`Database::inspect`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSummary {
    /// `PRAGMA user_version`
    pub schema_version: i32,
    /// Number of project rows
    pub projects: u64,
    /// Number of photo rows
    pub photos: u64,
    /// Every filename referenced by a photo row, sorted
    pub filenames: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_schema() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("store.db");
        let db = Database::open(&path).unwrap();
        db.close().map_err(|(_, e)| e).unwrap();

        let summary = Database::inspect(&path).unwrap();
        assert_eq!(summary.schema_version, CURRENT_VERSION);
        assert_eq!(summary.projects, 0);
        assert!(summary.filenames.is_empty());
    }

    #[test]
    fn test_inspect_rejects_foreign_database() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("other.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE notes (id INTEGER PRIMARY KEY);")
            .unwrap();
        drop(conn);

        let err = Database::inspect(&path).unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidData(_)));
    }

    #[test]
    fn test_inspect_rejects_garbage_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("garbage.db");
        std::fs::write(&path, b"definitely not sqlite, just some bytes to fill a page").unwrap();

        assert!(Database::inspect(&path).is_err());
    }
}
