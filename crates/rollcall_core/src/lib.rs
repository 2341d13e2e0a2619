//! Core registration and membership engine for rollcall.
//! This crate is the single source of truth for membership invariants.

pub mod config;
pub mod db;
pub mod identity;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use db::{database, init_database, open_db, open_db_in_memory, Database, DbError, RetryPolicy};
pub use identity::Actor;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::event::{Event, EventUpdate, NewEvent, ParticipationMode};
pub use model::organization::{NewOrganization, Organization, OrganizationLink};
pub use model::participant::{NewParticipant, Participant};
pub use model::registration::{Registration, RegistrationStatus};
pub use model::ModelValidationError;
pub use repo::{EntityKind, RepoError, RepoResult};
pub use service::cascade_service::{CascadeReport, CascadeService};
pub use service::error::{ServiceError, ServiceResult};
pub use service::event_service::{EventOverview, EventService};
pub use service::membership_service::{MembershipService, RemovalOutcome};
pub use service::organization_service::OrganizationService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
