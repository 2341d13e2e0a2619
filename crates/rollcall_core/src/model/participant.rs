//! Participant profile model.
//!
//! Credentials live with the identity provider; only the profile needed to
//! reference a participant from a registration is stored here.

use super::{require_non_blank, ModelValidationError, ParticipantId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    pub email: Option<String>,
    pub created_at: i64,
}

/// Input for registering or refreshing a participant profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParticipant {
    pub id: ParticipantId,
    pub display_name: String,
    pub email: Option<String>,
}

impl NewParticipant {
    pub fn new(id: impl Into<ParticipantId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            email: None,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_non_blank("id", &self.id)?;
        require_non_blank("display_name", &self.display_name)
    }
}
