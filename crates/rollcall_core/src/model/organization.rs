//! Organization domain model.
//!
//! An organization, typically a student club, owns events.
//! Deleting one cascades to every event it owns.

use super::{require_non_blank, ModelValidationError, OrganizationId};
use serde::{Deserialize, Serialize};

/// External profile link shown on an organization page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationLink {
    pub label: String,
    pub url: String,
    pub icon: String,
}

/// Persisted organization record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub campus: Option<String>,
    pub links: Vec<OrganizationLink>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Input for creating an organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrganization {
    pub id: OrganizationId,
    pub name: String,
    pub campus: Option<String>,
}

impl NewOrganization {
    pub fn new(id: impl Into<OrganizationId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            campus: None,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_non_blank("id", &self.id)?;
        require_non_blank("name", &self.name)
    }
}

pub(crate) fn validate_links(links: &[OrganizationLink]) -> Result<(), ModelValidationError> {
    for (index, link) in links.iter().enumerate() {
        if link.label.trim().is_empty() || link.url.trim().is_empty() {
            return Err(ModelValidationError::InvalidLink { index });
        }
    }
    Ok(())
}
