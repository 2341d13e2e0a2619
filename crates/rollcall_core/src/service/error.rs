//! Service-level error taxonomy.

use crate::db::{DbError, Retryable};
use crate::model::ModelValidationError;
use crate::repo::{EntityKind, RepoError};
use log::error;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors from core use-case operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Target entity does not resolve.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },
    /// Registration capacity is already reached.
    #[error("team is full: registration {registration_id} allows {capacity} members")]
    TeamFull {
        registration_id: String,
        capacity: u32,
    },
    /// Participant already holds a registration for this event.
    #[error("participant {participant_id} is already registered for event {event_id}")]
    AlreadyRegistered {
        event_id: String,
        participant_id: String,
    },
    /// Operation does not apply to the entity in its current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Input rejected before any write.
    #[error(transparent)]
    Validation(#[from] ModelValidationError),
    /// Actor may not manage the target.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Store-level invariant breach; indicates a logic fault.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    /// Storage transport failure.
    #[error(transparent)]
    Repo(RepoError),
}

impl ServiceError {
    pub(crate) fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Stable machine-readable code used in log lines and CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::TeamFull { .. } => "team_full",
            Self::AlreadyRegistered { .. } => "already_registered",
            Self::InvalidState(_) => "invalid_state",
            Self::Validation(_) => "validation",
            Self::Forbidden(_) => "forbidden",
            Self::ConstraintViolation(_) => "constraint_violation",
            Self::Repo(_) => "storage",
        }
    }

    /// Returns whether a caller can react to this error (show "team is full"
    /// and so on) as opposed to an internal fault.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::ConstraintViolation(_) | Self::Repo(_))
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { kind, id } => Self::NotFound { kind, id },
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::ConstraintViolation(detail) => {
                error!(
                    "event=constraint_violation module=service status=error detail={}",
                    detail
                );
                Self::ConstraintViolation(detail)
            }
            other => Self::Repo(other),
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(value: rusqlite::Error) -> Self {
        RepoError::from(value).into()
    }
}

impl From<DbError> for ServiceError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::Db(value))
    }
}

impl Retryable for ServiceError {
    fn is_busy(&self) -> bool {
        match self {
            Self::Repo(err) => err.is_busy(),
            _ => false,
        }
    }
}
