//! Connection readiness checks shared by every repository.

use super::{RepoError, RepoResult};
use crate::db::migrations::{current_user_version, latest_version};
use rusqlite::Connection;

/// Tables (and the columns each repository reads) that must exist before any
/// repository is handed a connection.
const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    ("organizations", &["id", "name", "campus", "links", "created_at", "updated_at"]),
    ("participants", &["id", "display_name", "email", "created_at"]),
    (
        "events",
        &[
            "id",
            "organization_id",
            "name",
            "participation",
            "max_team_members",
            "extra_questions",
        ],
    ),
    (
        "registrations",
        &[
            "id",
            "event_id",
            "reg_type",
            "max_team_members",
            "owner_id",
            "status",
            "team_name",
        ],
    ),
    ("registration_members", &["registration_id", "event_id", "participant_id"]),
];

/// Verifies that `conn` is migrated to the latest schema.
///
/// # Errors
/// - `UninitializedConnection` when `PRAGMA user_version` differs from the
///   latest migration.
/// - `MissingRequiredTable` / `MissingRequiredColumn` when the schema was
///   tampered with.
pub fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &(table, columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        let present = table_columns(conn, table)?;
        for &column in columns {
            if !present.iter().any(|name| name == column) {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get::<_, String>(1)?);
    }
    Ok(columns)
}
