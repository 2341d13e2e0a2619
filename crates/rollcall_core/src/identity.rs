//! Caller identity handed in by the embedding service.
//!
//! Authentication happens before the core is called. An `Actor` carries no
//! credential material.

use crate::model::{OrganizationId, ParticipantId};
use serde::{Deserialize, Serialize};

/// Already-authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Actor {
    Admin,
    Organization(OrganizationId),
    Participant(ParticipantId),
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Admins manage every organization; an organization manages itself.
    pub fn can_manage_organization(&self, organization_id: &str) -> bool {
        match self {
            Self::Admin => true,
            Self::Organization(id) => id == organization_id,
            Self::Participant(_) => false,
        }
    }

    /// Short label for log lines. Never includes the id.
    pub fn role(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Organization(_) => "organization",
            Self::Participant(_) => "participant",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Actor;

    #[test]
    fn organization_manages_only_itself() {
        let actor = Actor::Organization("gdsc".to_string());
        assert!(actor.can_manage_organization("gdsc"));
        assert!(!actor.can_manage_organization("acm"));
    }

    #[test]
    fn participant_manages_nothing_and_admin_everything() {
        assert!(!Actor::Participant("gdsc".to_string()).can_manage_organization("gdsc"));
        assert!(Actor::Admin.can_manage_organization("anything"));
    }

    #[test]
    fn serializes_with_role_tag() {
        let json = serde_json::to_value(Actor::Organization("acm".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"role": "organization", "id": "acm"}));
        let admin = serde_json::to_value(Actor::Admin).unwrap();
        assert_eq!(admin, serde_json::json!({"role": "admin"}));
    }
}
