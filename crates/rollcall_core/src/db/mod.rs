//! SQLite storage bootstrap, schema migration, and unit-of-work entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections for rollcall core.
//! - Apply schema migrations in deterministic order.
//! - Run multi-row writes as one `BEGIN IMMEDIATE` transaction.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Core code must not read/write application data before migrations succeed.
//! - Cross-record invariants are enforced inside store transactions, never
//!   through in-process locks.

mod handle;
pub mod migrations;
mod open;
mod tx;

pub use handle::{database, init_database, Database};
pub use open::{open_db, open_db_in_memory, open_db_with, ConnectionSettings};
pub use rusqlite::Connection;
pub use tx::{run_immediate, run_read, RetryPolicy, Retryable};

use std::path::PathBuf;
use thiserror::Error;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    #[error("database handle already initialized at `{active}`; refusing to switch to `{requested}`")]
    HandleConflict {
        active: PathBuf,
        requested: PathBuf,
    },
}

impl DbError {
    /// Returns whether the failure is a transient lock conflict worth retrying.
    pub fn is_busy(&self) -> bool {
        match self {
            Self::Sqlite(err) => sqlite_is_busy(err),
            _ => false,
        }
    }
}

pub(crate) fn sqlite_is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
    )
}
