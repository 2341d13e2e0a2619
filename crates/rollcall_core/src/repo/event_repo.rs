//! Event repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist event configuration and catalog listings.
//! - Keep SQL details inside core persistence boundary.
//!
//! # Invariants
//! - Write paths validate `NewEvent` / `EventUpdate` before SQL mutations.
//! - `delete_event` removes the event row only; a row still referenced by
//!   registrations is rejected with `ConstraintViolation`.
//! - Listings are deterministic: `event_date ASC, id ASC`.

use super::{bool_to_int, parse_bool, parse_count, EntityKind, RepoError, RepoResult};
use crate::model::event::{Event, EventUpdate, NewEvent, ParticipationMode};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;

const EVENT_SELECT_SQL: &str = "SELECT
    id,
    organization_id,
    name,
    description,
    category,
    event_date,
    image_ref,
    is_public,
    participation,
    max_team_members,
    access_password,
    extra_questions,
    created_at,
    updated_at
FROM events";

/// Repository interface for events.
pub trait EventRepository {
    fn create_event(&self, id: &str, event: &NewEvent) -> RepoResult<Event>;
    fn get_event(&self, id: &str) -> RepoResult<Option<Event>>;
    fn update_event(&self, id: &str, update: &EventUpdate) -> RepoResult<Event>;
    fn set_event_image(&self, id: &str, image_ref: Option<&str>) -> RepoResult<()>;
    fn list_events_for_organization(&self, organization_id: &str) -> RepoResult<Vec<Event>>;
    fn list_public_events(&self) -> RepoResult<Vec<Event>>;
    /// Deletes the bare event row. Returns `false` when no row matched.
    fn delete_event(&self, id: &str) -> RepoResult<bool>;
}

/// SQLite-backed event repository.
pub struct SqliteEventRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEventRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        super::ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    pub(crate) fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load_required(&self, id: &str) -> RepoResult<Event> {
        self.get_event(id)?
            .ok_or_else(|| RepoError::not_found(EntityKind::Event, id))
    }

    fn query_events(&self, sql: &str, arg: Option<&str>) -> RepoResult<Vec<Event>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = match arg {
            Some(value) => stmt.query([value])?,
            None => stmt.query([])?,
        };
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_event_row(row)?);
        }
        Ok(events)
    }
}

impl EventRepository for SqliteEventRepository<'_> {
    fn create_event(&self, id: &str, event: &NewEvent) -> RepoResult<Event> {
        event.validate()?;

        self.conn.execute(
            "INSERT INTO events (
                id,
                organization_id,
                name,
                description,
                category,
                event_date,
                is_public,
                participation,
                max_team_members,
                access_password,
                extra_questions
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
            params![
                id,
                event.organization_id.as_str(),
                event.name.trim(),
                event.description.as_str(),
                event.category.as_str(),
                event.event_date,
                bool_to_int(event.is_public),
                participation_to_db(event.participation),
                i64::from(event.max_team_members),
                event.access_password.as_deref(),
                encode_questions(event.extra_questions.as_ref())?,
            ],
        )?;

        self.load_required(id)
    }

    fn get_event(&self, id: &str) -> RepoResult<Option<Event>> {
        self.conn
            .query_row(&format!("{EVENT_SELECT_SQL} WHERE id = ?1;"), [id], |row| {
                Ok(parse_event_row(row))
            })
            .optional()?
            .transpose()
    }

    fn update_event(&self, id: &str, update: &EventUpdate) -> RepoResult<Event> {
        update.validate()?;

        let changed = self.conn.execute(
            "UPDATE events
             SET
                name = ?2,
                description = ?3,
                category = ?4,
                event_date = ?5,
                is_public = ?6,
                participation = ?7,
                max_team_members = ?8,
                access_password = ?9,
                extra_questions = ?10,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                id,
                update.name.trim(),
                update.description.as_str(),
                update.category.as_str(),
                update.event_date,
                bool_to_int(update.is_public),
                participation_to_db(update.participation),
                i64::from(update.max_team_members),
                update.access_password.as_deref(),
                encode_questions(update.extra_questions.as_ref())?,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Event, id));
        }
        self.load_required(id)
    }

    fn set_event_image(&self, id: &str, image_ref: Option<&str>) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE events
             SET image_ref = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, image_ref],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Event, id));
        }
        Ok(())
    }

    fn list_events_for_organization(&self, organization_id: &str) -> RepoResult<Vec<Event>> {
        self.query_events(
            &format!(
                "{EVENT_SELECT_SQL}
                 WHERE organization_id = ?1
                 ORDER BY event_date ASC, id ASC;"
            ),
            Some(organization_id),
        )
    }

    fn list_public_events(&self) -> RepoResult<Vec<Event>> {
        self.query_events(
            &format!(
                "{EVENT_SELECT_SQL}
                 WHERE is_public = 1
                 ORDER BY event_date ASC, id ASC;"
            ),
            None,
        )
    }

    fn delete_event(&self, id: &str) -> RepoResult<bool> {
        let changed = self.conn.execute("DELETE FROM events WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }
}

fn parse_event_row(row: &Row<'_>) -> RepoResult<Event> {
    let participation_text: String = row.get("participation")?;
    let participation = parse_participation(&participation_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid participation `{participation_text}` in events.participation"
        ))
    })?;

    let extra_questions = match row.get::<_, Option<String>>("extra_questions")? {
        Some(text) => Some(serde_json::from_str::<Value>(&text).map_err(|err| {
            RepoError::InvalidData(format!("invalid json in events.extra_questions: {err}"))
        })?),
        None => None,
    };

    Ok(Event {
        id: row.get("id")?,
        organization_id: row.get("organization_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        category: row.get("category")?,
        event_date: row.get("event_date")?,
        image_ref: row.get("image_ref")?,
        is_public: parse_bool(row.get("is_public")?, "events.is_public")?,
        participation,
        max_team_members: parse_count(row.get("max_team_members")?, "events.max_team_members")?,
        access_password: row.get("access_password")?,
        extra_questions,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn encode_questions(value: Option<&Value>) -> RepoResult<Option<String>> {
    value
        .map(|questions| {
            serde_json::to_string(questions).map_err(|err| {
                RepoError::InvalidData(format!("cannot encode extra questions: {err}"))
            })
        })
        .transpose()
}

pub(crate) fn participation_to_db(mode: ParticipationMode) -> &'static str {
    match mode {
        ParticipationMode::Solo => "solo",
        ParticipationMode::Team => "team",
    }
}

pub(crate) fn parse_participation(value: &str) -> Option<ParticipationMode> {
    match value {
        "solo" => Some(ParticipationMode::Solo),
        "team" => Some(ParticipationMode::Team),
        _ => None,
    }
}
