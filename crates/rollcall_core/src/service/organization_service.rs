//! Organization and participant profile use-cases.
//!
//! # Responsibility
//! - Admin-only organization creation; admin-or-self profile edits.
//! - Route organization deletion through the cascade service.
//! - Register participant profiles referenced by registrations.

use super::cascade_service::{CascadeReport, CascadeService};
use super::error::{ServiceError, ServiceResult};
use super::log_failure;
use crate::db::{run_immediate, RetryPolicy};
use crate::identity::Actor;
use crate::model::organization::{NewOrganization, Organization, OrganizationLink};
use crate::model::participant::{NewParticipant, Participant};
use crate::repo::organization_repo::{OrganizationRepository, SqliteOrganizationRepository};
use crate::repo::participant_repo::{ParticipantRepository, SqliteParticipantRepository};
use crate::repo::{ensure_connection_ready, EntityKind};
use log::info;
use rusqlite::Connection;
use std::time::Instant;

const MODULE: &str = "organization";

pub struct OrganizationService<'conn> {
    conn: &'conn Connection,
    retry: RetryPolicy,
}

impl<'conn> OrganizationService<'conn> {
    /// Creates service from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> ServiceResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self {
            conn,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Creates an organization under a caller-chosen handle.
    ///
    /// # Errors
    /// - `Forbidden` unless `actor` is an admin.
    /// - `InvalidState` when the handle is already taken.
    pub fn create_organization(
        &self,
        actor: &Actor,
        organization: &NewOrganization,
    ) -> ServiceResult<Organization> {
        let started_at = Instant::now();
        let result = if actor.is_admin() {
            organization.validate()?;
            run_immediate(self.conn, self.retry, "organization_create", |tx| {
                insert_organization(tx, organization)
            })
        } else {
            Err(ServiceError::Forbidden(format!(
                "{} may not create organizations",
                actor.role()
            )))
        };

        match &result {
            Ok(created) => info!(
                "event=organization_create module={} status=ok organization_id={} duration_ms={}",
                MODULE,
                created.id,
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("organization_create", MODULE, started_at, err),
        }
        result
    }

    pub fn get_organization(&self, organization_id: &str) -> ServiceResult<Option<Organization>> {
        Ok(SqliteOrganizationRepository::new(self.conn).get_organization(organization_id)?)
    }

    /// Lists organizations by name.
    pub fn list_organizations(&self) -> ServiceResult<Vec<Organization>> {
        Ok(SqliteOrganizationRepository::new(self.conn).list_organizations()?)
    }

    pub fn rename_organization(
        &self,
        actor: &Actor,
        organization_id: &str,
        name: &str,
    ) -> ServiceResult<Organization> {
        authorize(actor, organization_id)?;
        run_immediate(self.conn, self.retry, "organization_rename", |tx| {
            rename_in(tx, organization_id, name)
        })
    }

    /// Replaces the organization's link list in order.
    pub fn update_links(
        &self,
        actor: &Actor,
        organization_id: &str,
        links: &[OrganizationLink],
    ) -> ServiceResult<Organization> {
        authorize(actor, organization_id)?;
        run_immediate(self.conn, self.retry, "organization_links", |tx| {
            links_in(tx, organization_id, links)
        })
    }

    /// Deletes an organization with all of its events and registrations.
    ///
    /// Re-running after a partial failure removes only what remains.
    ///
    /// # Errors
    /// - `Forbidden` unless `actor` is an admin or the organization itself.
    pub fn delete_organization(
        &self,
        actor: &Actor,
        organization_id: &str,
    ) -> ServiceResult<CascadeReport> {
        authorize(actor, organization_id)?;
        CascadeService::try_new(self.conn)?
            .with_retry_policy(self.retry)
            .delete_organization(organization_id)
    }

    /// Stores or refreshes a participant profile.
    pub fn register_participant(&self, participant: &NewParticipant) -> ServiceResult<Participant> {
        let started_at = Instant::now();
        let result = run_immediate(self.conn, self.retry, "participant_register", |tx| {
            upsert_in(tx, participant)
        });
        match &result {
            Ok(_) => info!(
                "event=participant_register module={} status=ok duration_ms={}",
                MODULE,
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("participant_register", MODULE, started_at, err),
        }
        result
    }

    pub fn participant_exists(&self, participant_id: &str) -> ServiceResult<bool> {
        Ok(SqliteParticipantRepository::new(self.conn).participant_exists(participant_id)?)
    }
}

fn authorize(actor: &Actor, organization_id: &str) -> ServiceResult<()> {
    if actor.can_manage_organization(organization_id) {
        return Ok(());
    }
    Err(ServiceError::Forbidden(format!(
        "{} may not manage organization {organization_id}",
        actor.role()
    )))
}

fn insert_organization(
    conn: &Connection,
    organization: &NewOrganization,
) -> ServiceResult<Organization> {
    let organizations = SqliteOrganizationRepository::new(conn);
    let id = organization.id.trim();
    if organizations.get_organization(id)?.is_some() {
        return Err(ServiceError::InvalidState(format!(
            "organization handle {id} is already taken"
        )));
    }
    Ok(organizations.create_organization(organization)?)
}

fn rename_in(conn: &Connection, organization_id: &str, name: &str) -> ServiceResult<Organization> {
    let organizations = SqliteOrganizationRepository::new(conn);
    organizations.rename_organization(organization_id, name)?;
    reload(&organizations, organization_id)
}

fn links_in(
    conn: &Connection,
    organization_id: &str,
    links: &[OrganizationLink],
) -> ServiceResult<Organization> {
    let organizations = SqliteOrganizationRepository::new(conn);
    organizations.update_links(organization_id, links)?;
    reload(&organizations, organization_id)
}

fn reload(
    organizations: &SqliteOrganizationRepository<'_>,
    organization_id: &str,
) -> ServiceResult<Organization> {
    organizations
        .get_organization(organization_id)?
        .ok_or_else(|| ServiceError::not_found(EntityKind::Organization, organization_id))
}

fn upsert_in(conn: &Connection, participant: &NewParticipant) -> ServiceResult<Participant> {
    Ok(SqliteParticipantRepository::new(conn).upsert_participant(participant)?)
}
