//! Registration domain model.
//!
//! # Responsibility
//! - Describe one solo or team enrollment in an event together with its
//!   membership set.
//! - Provide the deterministic owner-succession rule.
//!
//! # Invariants
//! - `members` is sorted ascending and never empty for a persisted row.
//! - `owner_id` is contained in `members`.
//! - `reg_type` and `max_team_members` are frozen at creation.

use super::event::ParticipationMode;
use super::{EventId, ParticipantId, RegistrationId};
use serde::{Deserialize, Serialize};

/// Lifecycle status stored in `registrations.status`.
///
/// Only the active state is modeled; deletion removes the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Active,
}

impl RegistrationStatus {
    pub fn code(self) -> i64 {
        match self {
            Self::Active => 0,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Active),
            _ => None,
        }
    }
}

/// Persisted registration with its membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: RegistrationId,
    pub event_id: EventId,
    pub reg_type: ParticipationMode,
    pub max_team_members: u32,
    pub owner_id: ParticipantId,
    pub status: RegistrationStatus,
    pub team_name: Option<String>,
    /// Sorted ascending by participant id.
    pub members: Vec<ParticipantId>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Registration {
    pub fn has_member(&self, participant_id: &str) -> bool {
        self.members.iter().any(|member| member == participant_id)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Returns whether no further member may join.
    pub fn is_full(&self) -> bool {
        self.members.len() >= self.max_team_members as usize
    }

    pub fn is_owned_by(&self, participant_id: &str) -> bool {
        self.owner_id == participant_id
    }

    /// Picks the next owner when `leaving` departs: the smallest remaining id.
    ///
    /// Returns `None` when `leaving` is the only member.
    pub fn successor_owner(&self, leaving: &str) -> Option<&ParticipantId> {
        self.members
            .iter()
            .filter(|member| member.as_str() != leaving)
            .min()
    }
}
