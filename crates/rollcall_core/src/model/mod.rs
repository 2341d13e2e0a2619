//! Domain model for organizations, events, and registrations.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Provide input validation that runs before any storage write.
//!
//! # Invariants
//! - Every registration keeps `1 <= members.len() <= max_team_members`.
//! - A registration owner is always one of its members.

pub mod event;
pub mod organization;
pub mod participant;
pub mod registration;

use thiserror::Error;

/// Opaque organization identifier (the organization handle).
pub type OrganizationId = String;
/// Opaque participant identifier, such as an enrollment number.
pub type ParticipantId = String;
/// Opaque event identifier (UUID v4 text).
pub type EventId = String;
/// Opaque registration identifier (UUID v4 text).
pub type RegistrationId = String;

/// Input rejected before reaching storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelValidationError {
    #[error("{field} must not be blank")]
    BlankField { field: &'static str },
    #[error("max_team_members must be at least 1, got {0}")]
    InvalidCapacity(u32),
    #[error("organization link {index} must have a label and url")]
    InvalidLink { index: usize },
}

pub(crate) fn require_non_blank(
    field: &'static str,
    value: &str,
) -> Result<(), ModelValidationError> {
    if value.trim().is_empty() {
        return Err(ModelValidationError::BlankField { field });
    }
    Ok(())
}

/// Trims an optional label and drops it when nothing is left.
pub(crate) fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(str::to_string)
}
