//! Registration and membership repository.
//!
//! # Responsibility
//! - Persist registration rows and their participant membership relation.
//! - Answer "which registration holds participant X for event Y".
//!
//! # Invariants
//! - Membership lists are read sorted by `participant_id ASC`.
//! - Registration listings are deterministic: `created_at ASC, id ASC`.
//! - Deletes remove membership rows before the registration row; no
//!   `ON DELETE CASCADE` is relied on.
//! - Capacity, owner membership, and one-registration-per-event are also
//!   guarded by the schema; a breach surfaces as `ConstraintViolation`.

use super::event_repo::{parse_participation, participation_to_db};
use super::{parse_count, EntityKind, RepoError, RepoResult};
use crate::model::event::ParticipationMode;
use crate::model::registration::{Registration, RegistrationStatus};
use crate::model::{EventId, ParticipantId, RegistrationId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;

const REGISTRATION_SELECT_SQL: &str = "SELECT
    id,
    event_id,
    reg_type,
    max_team_members,
    owner_id,
    status,
    team_name,
    created_at,
    updated_at
FROM registrations";

/// Row values for a registration about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationDraft {
    pub id: RegistrationId,
    pub event_id: EventId,
    pub reg_type: ParticipationMode,
    pub max_team_members: u32,
    /// Initial owner, inserted as the first member.
    pub owner_id: ParticipantId,
    pub team_name: Option<String>,
}

/// Repository interface for registrations and membership.
pub trait RegistrationRepository {
    /// Inserts the registration row and its owner as first member.
    fn create_registration(&self, draft: &RegistrationDraft) -> RepoResult<Registration>;
    fn get_registration(&self, id: &str) -> RepoResult<Option<Registration>>;
    fn add_member(&self, registration_id: &str, participant_id: &str) -> RepoResult<()>;
    fn remove_member(&self, registration_id: &str, participant_id: &str) -> RepoResult<()>;
    fn set_owner(&self, registration_id: &str, owner_id: &str) -> RepoResult<()>;
    /// Deletes membership rows, then the registration. `false` when absent.
    fn delete_registration(&self, id: &str) -> RepoResult<bool>;
    fn find_registration_for_participant(
        &self,
        event_id: &str,
        participant_id: &str,
    ) -> RepoResult<Option<Registration>>;
    fn list_registrations_for_event(&self, event_id: &str) -> RepoResult<Vec<Registration>>;
    /// Deletes every registration of the event. Returns how many were removed.
    fn delete_registrations_for_event(&self, event_id: &str) -> RepoResult<usize>;
}

/// SQLite-backed registration repository.
pub struct SqliteRegistrationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRegistrationRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        super::ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    pub(crate) fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load_members(&self, registration_id: &str) -> RepoResult<Vec<ParticipantId>> {
        let mut stmt = self.conn.prepare(
            "SELECT participant_id
             FROM registration_members
             WHERE registration_id = ?1
             ORDER BY participant_id ASC;",
        )?;
        let mut rows = stmt.query([registration_id])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(row.get(0)?);
        }
        Ok(members)
    }

    fn touch(&self, registration_id: &str) -> RepoResult<()> {
        self.conn.execute(
            "UPDATE registrations
             SET updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            [registration_id],
        )?;
        Ok(())
    }
}

impl RegistrationRepository for SqliteRegistrationRepository<'_> {
    fn create_registration(&self, draft: &RegistrationDraft) -> RepoResult<Registration> {
        self.conn.execute(
            "INSERT INTO registrations (
                id,
                event_id,
                reg_type,
                max_team_members,
                owner_id,
                status,
                team_name
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                draft.id.as_str(),
                draft.event_id.as_str(),
                participation_to_db(draft.reg_type),
                i64::from(draft.max_team_members),
                draft.owner_id.as_str(),
                RegistrationStatus::Active.code(),
                draft.team_name.as_deref(),
            ],
        )?;
        self.conn.execute(
            "INSERT INTO registration_members (registration_id, event_id, participant_id)
             VALUES (?1, ?2, ?3);",
            params![
                draft.id.as_str(),
                draft.event_id.as_str(),
                draft.owner_id.as_str(),
            ],
        )?;

        self.get_registration(&draft.id)?
            .ok_or_else(|| RepoError::not_found(EntityKind::Registration, draft.id.as_str()))
    }

    fn get_registration(&self, id: &str) -> RepoResult<Option<Registration>> {
        let registration = self
            .conn
            .query_row(
                &format!("{REGISTRATION_SELECT_SQL} WHERE id = ?1;"),
                [id],
                |row| Ok(parse_registration_row(row)),
            )
            .optional()?
            .transpose()?;

        match registration {
            Some(mut registration) => {
                registration.members = self.load_members(&registration.id)?;
                Ok(Some(registration))
            }
            None => Ok(None),
        }
    }

    fn add_member(&self, registration_id: &str, participant_id: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "INSERT INTO registration_members (registration_id, event_id, participant_id)
             SELECT id, event_id, ?2
             FROM registrations
             WHERE id = ?1;",
            params![registration_id, participant_id],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(
                EntityKind::Registration,
                registration_id,
            ));
        }
        self.touch(registration_id)
    }

    fn remove_member(&self, registration_id: &str, participant_id: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM registration_members
             WHERE registration_id = ?1
               AND participant_id = ?2;",
            params![registration_id, participant_id],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(
                EntityKind::Membership,
                format!("{registration_id}/{participant_id}"),
            ));
        }
        self.touch(registration_id)
    }

    fn set_owner(&self, registration_id: &str, owner_id: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE registrations
             SET owner_id = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![registration_id, owner_id],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(
                EntityKind::Registration,
                registration_id,
            ));
        }
        Ok(())
    }

    fn delete_registration(&self, id: &str) -> RepoResult<bool> {
        self.conn.execute(
            "DELETE FROM registration_members WHERE registration_id = ?1;",
            [id],
        )?;
        let changed = self
            .conn
            .execute("DELETE FROM registrations WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }

    fn find_registration_for_participant(
        &self,
        event_id: &str,
        participant_id: &str,
    ) -> RepoResult<Option<Registration>> {
        let registration_id: Option<String> = self
            .conn
            .query_row(
                "SELECT registration_id
                 FROM registration_members
                 WHERE event_id = ?1
                   AND participant_id = ?2;",
                params![event_id, participant_id],
                |row| row.get(0),
            )
            .optional()?;

        match registration_id {
            Some(id) => self.get_registration(&id),
            None => Ok(None),
        }
    }

    fn list_registrations_for_event(&self, event_id: &str) -> RepoResult<Vec<Registration>> {
        let mut members_by_registration: HashMap<String, Vec<ParticipantId>> = HashMap::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT registration_id, participant_id
                 FROM registration_members
                 WHERE event_id = ?1
                 ORDER BY registration_id ASC, participant_id ASC;",
            )?;
            let mut rows = stmt.query([event_id])?;
            while let Some(row) = rows.next()? {
                let registration_id: String = row.get(0)?;
                members_by_registration
                    .entry(registration_id)
                    .or_default()
                    .push(row.get(1)?);
            }
        }

        let mut stmt = self.conn.prepare(&format!(
            "{REGISTRATION_SELECT_SQL}
             WHERE event_id = ?1
             ORDER BY created_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([event_id])?;
        let mut registrations = Vec::new();
        while let Some(row) = rows.next()? {
            let mut registration = parse_registration_row(row)?;
            registration.members = members_by_registration
                .remove(&registration.id)
                .unwrap_or_default();
            registrations.push(registration);
        }
        Ok(registrations)
    }

    fn delete_registrations_for_event(&self, event_id: &str) -> RepoResult<usize> {
        self.conn.execute(
            "DELETE FROM registration_members WHERE event_id = ?1;",
            [event_id],
        )?;
        let removed = self
            .conn
            .execute("DELETE FROM registrations WHERE event_id = ?1;", [event_id])?;
        Ok(removed)
    }
}

/// Parses registration columns; `members` is left empty for the caller to fill.
fn parse_registration_row(row: &Row<'_>) -> RepoResult<Registration> {
    let reg_type_text: String = row.get("reg_type")?;
    let reg_type = parse_participation(&reg_type_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid reg_type `{reg_type_text}` in registrations.reg_type"
        ))
    })?;

    let status_code: i64 = row.get("status")?;
    let status = RegistrationStatus::from_code(status_code).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_code}` in registrations.status"
        ))
    })?;

    Ok(Registration {
        id: row.get("id")?,
        event_id: row.get("event_id")?,
        reg_type,
        max_team_members: parse_count(
            row.get("max_team_members")?,
            "registrations.max_team_members",
        )?,
        owner_id: row.get("owner_id")?,
        status,
        team_name: row.get("team_name")?,
        members: Vec::new(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
