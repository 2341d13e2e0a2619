//! Ordered deletion of events and organizations together with their
//! dependents.
//!
//! # Invariants
//! - Order is explicit: membership rows, then registrations, then the event,
//!   and the organization last. No `ON DELETE CASCADE` is relied on.
//! - Each event cascade commits as one unit, so no reader ever sees an
//!   event without its registrations or registrations without their event.
//! - Deletes are idempotent. Re-running a cascade after a partial failure
//!   finishes the remaining work; a missing root is a no-op, not an error.

use super::error::ServiceResult;
use super::log_failure;
use crate::db::{run_immediate, run_read, RetryPolicy};
use crate::repo::ensure_connection_ready;
use crate::repo::event_repo::{EventRepository, SqliteEventRepository};
use crate::repo::organization_repo::{OrganizationRepository, SqliteOrganizationRepository};
use crate::repo::registration_repo::{RegistrationRepository, SqliteRegistrationRepository};
use log::info;
use rusqlite::Connection;
use serde::Serialize;
use std::time::Instant;

const MODULE: &str = "cascade";

/// Row counts removed by one cascade call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub events_deleted: usize,
    pub registrations_deleted: usize,
    /// Whether the root row itself was removed by this call.
    pub root_deleted: bool,
}

impl CascadeReport {
    fn absorb(&mut self, child: CascadeReport) {
        self.events_deleted += child.events_deleted;
        self.registrations_deleted += child.registrations_deleted;
    }
}

pub struct CascadeService<'conn> {
    conn: &'conn Connection,
    retry: RetryPolicy,
}

impl<'conn> CascadeService<'conn> {
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

    /// Deletes an event and every registration of it in one unit.
    ///
    /// An event that no longer exists yields an empty report.
    pub fn delete_event(&self, event_id: &str) -> ServiceResult<CascadeReport> {
        let started_at = Instant::now();
        let result = run_immediate(self.conn, self.retry, "event_cascade", |tx| {
            cascade_event(tx, event_id)
        });

        match &result {
            Ok(report) => info!(
                "event=event_cascade module={} status=ok event_id={} root_deleted={} registrations_deleted={} duration_ms={}",
                MODULE,
                event_id,
                report.root_deleted,
                report.registrations_deleted,
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("event_cascade", MODULE, started_at, err),
        }
        result
    }

    /// Deletes every event of an organization (each with its
    /// registrations), then the organization.
    ///
    /// Events are cascaded in their own units first. A final unit
    /// re-enumerates the events left behind by concurrent writers, cascades
    /// them, and removes the organization, so the organization row is never
    /// deleted while an event still points at it.
    pub fn delete_organization(&self, organization_id: &str) -> ServiceResult<CascadeReport> {
        let started_at = Instant::now();
        let result = self.cascade_organization(organization_id);

        match &result {
            Ok(report) => info!(
                "event=organization_cascade module={} status=ok organization_id={} root_deleted={} events_deleted={} registrations_deleted={} duration_ms={}",
                MODULE,
                organization_id,
                report.root_deleted,
                report.events_deleted,
                report.registrations_deleted,
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("organization_cascade", MODULE, started_at, err),
        }
        result
    }

    fn cascade_organization(&self, organization_id: &str) -> ServiceResult<CascadeReport> {
        let mut report = CascadeReport::default();

        for event_id in self.event_ids(organization_id)? {
            report.absorb(self.delete_event(&event_id)?);
        }

        let last = run_immediate(self.conn, self.retry, "organization_cascade", |tx| {
            finish_organization(tx, organization_id)
        })?;
        report.absorb(last);
        report.root_deleted = last.root_deleted;
        Ok(report)
    }

    fn event_ids(&self, organization_id: &str) -> ServiceResult<Vec<String>> {
        run_read(self.conn, |tx| event_ids_in(tx, organization_id))
    }
}

fn event_ids_in(conn: &Connection, organization_id: &str) -> ServiceResult<Vec<String>> {
    Ok(SqliteEventRepository::new(conn)
        .list_events_for_organization(organization_id)?
        .into_iter()
        .map(|event| event.id)
        .collect())
}

/// Cascades whatever events remain, then removes the organization row.
fn finish_organization(conn: &Connection, organization_id: &str) -> ServiceResult<CascadeReport> {
    let mut tail = CascadeReport::default();
    for event_id in event_ids_in(conn, organization_id)? {
        tail.absorb(cascade_event(conn, &event_id)?);
    }
    tail.root_deleted =
        SqliteOrganizationRepository::new(conn).delete_organization(organization_id)?;
    Ok(tail)
}

fn cascade_event(conn: &Connection, event_id: &str) -> ServiceResult<CascadeReport> {
    let registrations_deleted =
        SqliteRegistrationRepository::new(conn).delete_registrations_for_event(event_id)?;
    let root_deleted = SqliteEventRepository::new(conn).delete_event(event_id)?;
    Ok(CascadeReport {
        events_deleted: usize::from(root_deleted),
        registrations_deleted,
        root_deleted,
    })
}

#[cfg(test)]
mod tests {
    use super::CascadeReport;

    #[test]
    fn absorb_sums_counts_but_keeps_root_flag() {
        let mut report = CascadeReport::default();
        report.absorb(CascadeReport {
            events_deleted: 1,
            registrations_deleted: 3,
            root_deleted: true,
        });
        report.absorb(CascadeReport {
            events_deleted: 1,
            registrations_deleted: 0,
            root_deleted: true,
        });

        assert_eq!(report.events_deleted, 2);
        assert_eq!(report.registrations_deleted, 3);
        assert!(!report.root_deleted);
    }
}
