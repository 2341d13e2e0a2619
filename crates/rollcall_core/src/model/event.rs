//! Event domain model.
//!
//! # Responsibility
//! - Describe an organization-owned event and its participation rules.
//! - Validate create/update input before persistence.
//!
//! # Invariants
//! - `max_team_members >= 1`; the value only constrains `Team` registrations.
//! - Registrations copy `participation` and `max_team_members` at creation,
//!   so editing an event never changes existing registrations.

use super::{require_non_blank, EventId, ModelValidationError, OrganizationId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How participants enroll in an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationMode {
    /// One participant per registration.
    Solo,
    /// Teams of up to `max_team_members` participants.
    Team,
}

/// Persisted event record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub description: String,
    /// Free-form event type, e.g. `hackathon` or `workshop`.
    pub category: String,
    /// Unix epoch milliseconds.
    pub event_date: i64,
    /// Object-store key of the banner image; bytes live outside the core.
    pub image_ref: Option<String>,
    pub is_public: bool,
    pub participation: ParticipationMode,
    pub max_team_members: u32,
    #[serde(skip_serializing)]
    pub access_password: Option<String>,
    /// Organizer-defined question schema, stored verbatim.
    pub extra_questions: Option<Value>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Event {
    /// Returns whether registrations for this event may hold more than one member.
    pub fn is_team(&self) -> bool {
        self.participation == ParticipationMode::Team
    }
}

/// Input for creating an event.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub organization_id: OrganizationId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub event_date: i64,
    pub is_public: bool,
    pub participation: ParticipationMode,
    pub max_team_members: u32,
    pub access_password: Option<String>,
    pub extra_questions: Option<Value>,
}

impl NewEvent {
    /// Creates a public solo event with capacity 1 and empty optional fields.
    pub fn solo(
        organization_id: impl Into<OrganizationId>,
        name: impl Into<String>,
        event_date: i64,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            name: name.into(),
            description: String::new(),
            category: String::new(),
            event_date,
            is_public: true,
            participation: ParticipationMode::Solo,
            max_team_members: 1,
            access_password: None,
            extra_questions: None,
        }
    }

    /// Creates a public team event with the given capacity.
    pub fn team(
        organization_id: impl Into<OrganizationId>,
        name: impl Into<String>,
        event_date: i64,
        max_team_members: u32,
    ) -> Self {
        Self {
            participation: ParticipationMode::Team,
            max_team_members,
            ..Self::solo(organization_id, name, event_date)
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_non_blank("organization_id", &self.organization_id)?;
        require_non_blank("name", &self.name)?;
        validate_capacity(self.max_team_members)
    }
}

/// Editable event fields. The owning organization never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct EventUpdate {
    pub name: String,
    pub description: String,
    pub category: String,
    pub event_date: i64,
    pub is_public: bool,
    pub participation: ParticipationMode,
    pub max_team_members: u32,
    pub access_password: Option<String>,
    pub extra_questions: Option<Value>,
}

impl EventUpdate {
    /// Starts an update from the event's current values.
    pub fn from_event(event: &Event) -> Self {
        Self {
            name: event.name.clone(),
            description: event.description.clone(),
            category: event.category.clone(),
            event_date: event.event_date,
            is_public: event.is_public,
            participation: event.participation,
            max_team_members: event.max_team_members,
            access_password: event.access_password.clone(),
            extra_questions: event.extra_questions.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_non_blank("name", &self.name)?;
        validate_capacity(self.max_team_members)
    }
}

fn validate_capacity(max_team_members: u32) -> Result<(), ModelValidationError> {
    if max_team_members == 0 {
        return Err(ModelValidationError::InvalidCapacity(max_team_members));
    }
    Ok(())
}
