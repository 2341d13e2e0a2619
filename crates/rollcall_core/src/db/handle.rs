//! Process-wide database handle.
//!
//! # Responsibility
//! - Hold the database location and connection settings opened at startup.
//! - Lend each thread one cached connection that is reused across requests.
//!
//! # Invariants
//! - Migrations run once, inside `Database::open`.
//! - `init_database` is idempotent for the same path and rejects a different
//!   one, mirroring logging initialization.
//! - A thread never holds its cached connection across two live borrows; the
//!   connection is checked out for the duration of one closure.

use super::open::{open_db_with, ConnectionSettings};
use super::{DbError, DbResult};
use log::info;
use once_cell::sync::OnceCell;
use rusqlite::Connection;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

static DATABASE: OnceCell<Database> = OnceCell::new();

thread_local! {
    static CONNECTIONS: RefCell<HashMap<PathBuf, Connection>> = RefCell::new(HashMap::new());
}

/// Opened database location shared by every request in the process.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    settings: ConnectionSettings,
}

impl Database {
    /// Opens the database once, applying migrations, and returns the handle.
    pub fn open(path: impl AsRef<Path>, settings: ConnectionSettings) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = open_db_with(&path, &settings)?;
        let handle = Self { path, settings };
        handle.check_in(conn);
        Ok(handle)
    }

    /// Database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Connection settings applied to every lent connection.
    pub fn settings(&self) -> ConnectionSettings {
        self.settings
    }

    /// Runs `f` with this thread's cached connection, opening it on first use.
    ///
    /// A nested call on the same thread gets a second, independent connection
    /// for its duration.
    pub fn with_connection<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<DbError>,
        F: FnOnce(&Connection) -> Result<T, E>,
    {
        let conn = match self.check_out() {
            Some(conn) => conn,
            None => open_db_with(&self.path, &self.settings)?,
        };
        let result = f(&conn);
        self.check_in(conn);
        result
    }

    fn check_out(&self) -> Option<Connection> {
        CONNECTIONS.with(|cell| cell.borrow_mut().remove(&self.path))
    }

    fn check_in(&self, conn: Connection) {
        CONNECTIONS.with(|cell| {
            cell.borrow_mut()
                .entry(self.path.clone())
                .or_insert(conn);
        });
    }
}

/// Initializes the process-wide database handle.
///
/// # Errors
/// - Returns `DbError::HandleConflict` when already initialized elsewhere.
/// - Returns open/migration errors from the first initialization.
pub fn init_database(
    path: impl AsRef<Path>,
    settings: ConnectionSettings,
) -> DbResult<&'static Database> {
    let requested = path.as_ref().to_path_buf();
    let handle = DATABASE.get_or_try_init(|| {
        let handle = Database::open(&requested, settings)?;
        info!(
            "event=db_handle_init module=db status=ok path={}",
            requested.display()
        );
        Ok::<_, DbError>(handle)
    })?;

    if handle.path != requested {
        return Err(DbError::HandleConflict {
            active: handle.path.clone(),
            requested,
        });
    }
    Ok(handle)
}

/// Returns the process-wide handle, if `init_database` has run.
pub fn database() -> Option<&'static Database> {
    DATABASE.get()
}
