//! Event use-case service.
//!
//! # Responsibility
//! - Authorized create/update of events by their organization or an admin.
//! - Catalog reads: single event, event overview, per-organization and
//!   public listings.
//! - Route event deletion through the cascade service.
//!
//! # Invariants
//! - Authorization is decided on the event row read inside the writing unit.
//! - Editing an event never touches existing registrations; they keep the
//!   participation mode and capacity copied at creation.

use super::cascade_service::{CascadeReport, CascadeService};
use super::error::{ServiceError, ServiceResult};
use super::log_failure;
use crate::db::{run_immediate, run_read, RetryPolicy};
use crate::identity::Actor;
use crate::model::event::{Event, EventUpdate, NewEvent};
use crate::model::registration::Registration;
use crate::repo::event_repo::{EventRepository, SqliteEventRepository};
use crate::repo::organization_repo::{OrganizationRepository, SqliteOrganizationRepository};
use crate::repo::registration_repo::{RegistrationRepository, SqliteRegistrationRepository};
use crate::repo::{ensure_connection_ready, EntityKind};
use log::info;
use rusqlite::Connection;
use serde::Serialize;
use std::time::Instant;
use uuid::Uuid;

const MODULE: &str = "event";

/// Event together with its current registrations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventOverview {
    pub event: Event,
    pub registrations: Vec<Registration>,
}

/// Event service facade over SQLite repositories.
pub struct EventService<'conn> {
    conn: &'conn Connection,
    retry: RetryPolicy,
}

impl<'conn> EventService<'conn> {
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

    /// Creates an event under `event.organization_id` with a fresh UUID id.
    ///
    /// # Errors
    /// - `Validation` for a blank name or zero capacity.
    /// - `Forbidden` unless `actor` manages the organization.
    /// - `NotFound` for an unknown organization.
    pub fn create_event(&self, actor: &Actor, event: &NewEvent) -> ServiceResult<Event> {
        let started_at = Instant::now();
        let result = self.create_event_inner(actor, event);
        match &result {
            Ok(created) => info!(
                "event=event_create module={} status=ok actor_role={} event_id={} participation={:?} capacity={} duration_ms={}",
                MODULE,
                actor.role(),
                created.id,
                created.participation,
                created.max_team_members,
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("event_create", MODULE, started_at, err),
        }
        result
    }

    fn create_event_inner(&self, actor: &Actor, event: &NewEvent) -> ServiceResult<Event> {
        event.validate()?;
        authorize(actor, &event.organization_id)?;

        let event_id = Uuid::new_v4().to_string();
        run_immediate(self.conn, self.retry, "event_create", |tx| {
            insert_event(tx, &event_id, event)
        })
    }

    /// Replaces the editable fields of an event.
    ///
    /// # Errors
    /// - `Validation` for a blank name or zero capacity.
    /// - `NotFound` for an unknown event.
    /// - `Forbidden` unless `actor` manages the owning organization.
    pub fn update_event(
        &self,
        actor: &Actor,
        event_id: &str,
        update: &EventUpdate,
    ) -> ServiceResult<Event> {
        let started_at = Instant::now();
        update.validate()?;
        let result = run_immediate(self.conn, self.retry, "event_update", |tx| {
            update_authorized(tx, actor, event_id, update)
        });
        match &result {
            Ok(_) => info!(
                "event=event_update module={} status=ok actor_role={} event_id={} duration_ms={}",
                MODULE,
                actor.role(),
                event_id,
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("event_update", MODULE, started_at, err),
        }
        result
    }

    /// Points the event at a new banner object key, or clears it.
    pub fn set_event_image(
        &self,
        actor: &Actor,
        event_id: &str,
        image_ref: Option<&str>,
    ) -> ServiceResult<Event> {
        run_immediate(self.conn, self.retry, "event_image", |tx| {
            set_image_authorized(tx, actor, event_id, image_ref)
        })
    }

    /// Deletes an event and its registrations through the cascade service.
    ///
    /// An event that is already gone yields an empty report.
    ///
    /// # Errors
    /// - `Forbidden` unless `actor` manages the owning organization.
    pub fn delete_event(&self, actor: &Actor, event_id: &str) -> ServiceResult<CascadeReport> {
        let Some(event) = self.get_event(event_id)? else {
            return Ok(CascadeReport::default());
        };
        authorize(actor, &event.organization_id)?;
        CascadeService::try_new(self.conn)?
            .with_retry_policy(self.retry)
            .delete_event(event_id)
    }

    pub fn get_event(&self, event_id: &str) -> ServiceResult<Option<Event>> {
        Ok(SqliteEventRepository::new(self.conn).get_event(event_id)?)
    }

    /// Reads an event and its registrations from one snapshot.
    ///
    /// # Errors
    /// - `NotFound` for an unknown event.
    pub fn event_overview(&self, event_id: &str) -> ServiceResult<EventOverview> {
        run_read(self.conn, |tx| overview_in(tx, event_id))
    }

    /// Lists an organization's events by date.
    pub fn list_events_for_organization(&self, organization_id: &str) -> ServiceResult<Vec<Event>> {
        Ok(SqliteEventRepository::new(self.conn).list_events_for_organization(organization_id)?)
    }

    /// Lists public events by date.
    pub fn list_public_events(&self) -> ServiceResult<Vec<Event>> {
        Ok(SqliteEventRepository::new(self.conn).list_public_events()?)
    }
}

fn authorize(actor: &Actor, organization_id: &str) -> ServiceResult<()> {
    if actor.can_manage_organization(organization_id) {
        return Ok(());
    }
    Err(ServiceError::Forbidden(format!(
        "{} may not manage events of organization {organization_id}",
        actor.role()
    )))
}

fn insert_event(conn: &Connection, event_id: &str, event: &NewEvent) -> ServiceResult<Event> {
    let organizations = SqliteOrganizationRepository::new(conn);
    if organizations
        .get_organization(&event.organization_id)?
        .is_none()
    {
        return Err(ServiceError::not_found(
            EntityKind::Organization,
            event.organization_id.as_str(),
        ));
    }
    Ok(SqliteEventRepository::new(conn).create_event(event_id, event)?)
}

fn load_authorized(conn: &Connection, actor: &Actor, event_id: &str) -> ServiceResult<Event> {
    let event = SqliteEventRepository::new(conn)
        .get_event(event_id)?
        .ok_or_else(|| ServiceError::not_found(EntityKind::Event, event_id))?;
    authorize(actor, &event.organization_id)?;
    Ok(event)
}

fn update_authorized(
    conn: &Connection,
    actor: &Actor,
    event_id: &str,
    update: &EventUpdate,
) -> ServiceResult<Event> {
    load_authorized(conn, actor, event_id)?;
    Ok(SqliteEventRepository::new(conn).update_event(event_id, update)?)
}

fn set_image_authorized(
    conn: &Connection,
    actor: &Actor,
    event_id: &str,
    image_ref: Option<&str>,
) -> ServiceResult<Event> {
    load_authorized(conn, actor, event_id)?;
    let events = SqliteEventRepository::new(conn);
    events.set_event_image(event_id, image_ref)?;
    events
        .get_event(event_id)?
        .ok_or_else(|| ServiceError::not_found(EntityKind::Event, event_id))
}

fn overview_in(conn: &Connection, event_id: &str) -> ServiceResult<EventOverview> {
    let event = SqliteEventRepository::new(conn)
        .get_event(event_id)?
        .ok_or_else(|| ServiceError::not_found(EntityKind::Event, event_id))?;
    let registrations =
        SqliteRegistrationRepository::new(conn).list_registrations_for_event(event_id)?;
    Ok(EventOverview {
        event,
        registrations,
    })
}
