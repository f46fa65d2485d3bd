//! Process-wide store handle with an explicit open/closed lifecycle
//!
//! Every query goes through [`StoreHandle::with_db`]. While an import has the
//! store quiesced, callers get [`StoreError::Unavailable`] instead of racing
//! the file replacement.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use super::db::{Database, DatabaseError};

/// Lifecycle state visible to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Open,
    Closed,
    Reopening,
}

impl StoreState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Reopening => "reopening",
        }
    }
}

impl fmt::Display for StoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from going through the store gate
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store is {0} for maintenance, retry shortly")]
    Unavailable(StoreState),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

enum Slot {
    Open(Database),
    Closed,
    Reopening,
}

impl Slot {
    fn state(&self) -> StoreState {
        match self {
            Self::Open(_) => StoreState::Open,
            Self::Closed => StoreState::Closed,
            Self::Reopening => StoreState::Reopening,
        }
    }
}

/// Gatekeeper around the single database connection
pub struct StoreHandle {
    path: PathBuf,
    slot: Mutex<Slot>,
}

impl StoreHandle {
    /// Open the database at `path` and wrap it in a handle
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let db = Database::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            slot: Mutex::new(Slot::Open(db)),
        })
    }

    /// Path of the database file this handle manages
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current lifecycle state
    pub fn state(&self) -> StoreState {
        self.lock().state()
    }

    /// Run `f` against the open database.
    ///
    /// The gate is held for the duration of `f`, so anything done inside
    /// (including upload-file writes) is serialized with quiescing.
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] (converted into `E`) if the store
    /// is not open, otherwise whatever `f` returns
    pub fn with_db<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Database) -> Result<T, E>,
        E: From<StoreError>,
    {
        let guard = self.lock();
        match &*guard {
            Slot::Open(db) => f(db),
            other => Err(StoreError::Unavailable(other.state()).into()),
        }
    }

    /// Close the database so its file can be replaced.
    ///
    /// The returned guard reopens the store when dropped unless
    /// [`QuiescedStore::reopen`] already succeeded.
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] if the store is already quiesced,
    /// or a database error if SQLite refuses to close (the store stays open)
    pub fn quiesce(&self) -> Result<QuiescedStore<'_>, StoreError> {
        let mut guard = self.lock();
        let db = match std::mem::replace(&mut *guard, Slot::Closed) {
            Slot::Open(db) => db,
            other => {
                let state = other.state();
                *guard = other;
                return Err(StoreError::Unavailable(state));
            }
        };

        if let Err((db, e)) = db.close() {
            *guard = Slot::Open(db);
            return Err(e.into());
        }

        tracing::info!(path = %self.path.display(), "Store quiesced");
        Ok(QuiescedStore {
            handle: self,
            reopened: false,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        // A panic inside with_db leaves the slot itself intact
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof that the store is closed; reopens on drop
pub struct QuiescedStore<'a> {
    handle: &'a StoreHandle,
    reopened: bool,
}

impl QuiescedStore<'_> {
    /// Reopen the database file at the handle's path.
    ///
    /// The slot reads `Reopening` while the file is being opened. On failure
    /// it goes back to `Closed` and the call may be retried (e.g. after
    /// restoring a rollback point).
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened
    pub fn reopen(&mut self) -> Result<(), DatabaseError> {
        self.reopen_with(|| Ok(()))
    }

    /// Reopen, running `commit` once the file has opened but before any
    /// caller can reach it.
    ///
    /// If `commit` fails the new connection is dropped and the slot goes
    /// back to `Closed`, same as a failed open.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or `commit` fails
    pub fn reopen_with<F, E>(&mut self, commit: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<(), E>,
        E: From<DatabaseError>,
    {
        if self.reopened {
            return Ok(());
        }

        *self.handle.lock() = Slot::Reopening;
        let result = Database::open(&self.handle.path)
            .map_err(E::from)
            .and_then(|db| commit().map(|()| db));
        let mut guard = self.handle.lock();

        match result {
            Ok(db) => {
                *guard = Slot::Open(db);
                self.reopened = true;
                tracing::info!(path = %self.handle.path.display(), "Store reopened");
                Ok(())
            }
            Err(e) => {
                *guard = Slot::Closed;
                Err(e)
            }
        }
    }
}

impl Drop for QuiescedStore<'_> {
    fn drop(&mut self) {
        if self.reopened {
            return;
        }
        if let Err(e) = self.reopen() {
            tracing::error!(
                path = %self.handle.path.display(),
                error = %e,
                "Store could not be reopened; requests will be rejected until restart"
            );
        }
    }
}
