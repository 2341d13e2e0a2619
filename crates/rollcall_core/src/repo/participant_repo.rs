//! Participant profile repository.

use super::{EntityKind, RepoError, RepoResult};
use crate::model::participant::{NewParticipant, Participant};
use rusqlite::{params, Connection, OptionalExtension};

/// Repository interface for participant profiles.
pub trait ParticipantRepository {
    /// Inserts the profile or refreshes name/email of an existing one.
    fn upsert_participant(&self, participant: &NewParticipant) -> RepoResult<Participant>;
    fn get_participant(&self, id: &str) -> RepoResult<Option<Participant>>;
    fn participant_exists(&self, id: &str) -> RepoResult<bool>;
}

/// SQLite-backed participant repository.
pub struct SqliteParticipantRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteParticipantRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        super::ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    pub(crate) fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ParticipantRepository for SqliteParticipantRepository<'_> {
    fn upsert_participant(&self, participant: &NewParticipant) -> RepoResult<Participant> {
        participant.validate()?;
        let id = participant.id.trim();

        self.conn.execute(
            "INSERT INTO participants (id, display_name, email)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (id) DO UPDATE SET
                display_name = excluded.display_name,
                email = excluded.email;",
            params![
                id,
                participant.display_name.trim(),
                participant.email.as_deref(),
            ],
        )?;

        self.get_participant(id)?
            .ok_or_else(|| RepoError::not_found(EntityKind::Participant, id))
    }

    fn get_participant(&self, id: &str) -> RepoResult<Option<Participant>> {
        let participant = self
            .conn
            .query_row(
                "SELECT id, display_name, email, created_at
                 FROM participants
                 WHERE id = ?1;",
                [id],
                |row| {
                    Ok(Participant {
                        id: row.get("id")?,
                        display_name: row.get("display_name")?,
                        email: row.get("email")?,
                        created_at: row.get("created_at")?,
                    })
                },
            )
            .optional()?;
        Ok(participant)
    }

    fn participant_exists(&self, id: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM participants WHERE id = ?1);",
            [id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}
