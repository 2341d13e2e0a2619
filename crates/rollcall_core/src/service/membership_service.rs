//! Membership use-case service.
//!
//! # Responsibility
//! - Join participants to new or existing registrations under capacity.
//! - Remove participants, deleting registrations that would become empty and
//!   handing ownership to a remaining member.
//! - Answer whether a participant is registered for an event.
//!
//! # Invariants
//! - Capacity check and member insert run in one `BEGIN IMMEDIATE` unit, so
//!   two joins racing for the last slot are totally ordered: one succeeds,
//!   the other observes the full team and fails with `TeamFull`.
//! - Owner succession picks the smallest remaining participant id, decided on
//!   membership read inside the same unit that writes it.
//! - A registration is never left with zero members.

use super::error::{ServiceError, ServiceResult};
use super::log_failure;
use crate::db::{run_immediate, run_read, RetryPolicy};
use crate::model::event::{Event, ParticipationMode};
use crate::model::registration::Registration;
use crate::model::{normalize_optional, ParticipantId, RegistrationId};
use crate::repo::event_repo::{EventRepository, SqliteEventRepository};
use crate::repo::participant_repo::{ParticipantRepository, SqliteParticipantRepository};
use crate::repo::registration_repo::{
    RegistrationDraft, RegistrationRepository, SqliteRegistrationRepository,
};
use crate::repo::{ensure_connection_ready, EntityKind};
use log::info;
use rusqlite::Connection;
use serde::Serialize;
use std::time::Instant;
use uuid::Uuid;

const MODULE: &str = "membership";

/// Result of removing a participant (or a whole registration).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RemovalOutcome {
    /// The registration no longer exists.
    Deleted { registration_id: RegistrationId },
    /// The participant left; the registration lives on with the rest.
    MemberRemoved {
        registration: Registration,
        /// Set when the leaving participant was the owner.
        new_owner: Option<ParticipantId>,
    },
}

/// Registration membership service.
pub struct MembershipService<'conn> {
    conn: &'conn Connection,
    retry: RetryPolicy,
}

impl<'conn> MembershipService<'conn> {
    /// Creates service from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> ServiceResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self {
            conn,
            retry: RetryPolicy::default(),
        })
    }

    /// Overrides the lock-conflict retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Joins `participant_id` to `event_id`.
    ///
    /// With `existing_registration_id` the participant joins that team;
    /// otherwise a new registration is created with the participant as owner
    /// and sole member, copying participation mode and capacity from the
    /// event. `team_name` only applies to new registrations.
    ///
    /// Returns the registration re-read after the write.
    ///
    /// # Errors
    /// - `NotFound` for an unknown event, participant, or registration.
    /// - `AlreadyRegistered` when the participant holds a registration for the
    ///   event already.
    /// - `InvalidState` when the target registration belongs to another event
    ///   or is a solo registration.
    /// - `TeamFull` when the target registration is at capacity.
    pub fn add_registration(
        &self,
        event_id: &str,
        participant_id: &str,
        existing_registration_id: Option<&str>,
        team_name: Option<&str>,
    ) -> ServiceResult<Registration> {
        let started_at = Instant::now();
        let result = run_immediate(self.conn, self.retry, "registration_join", |tx| {
            join_unit(tx, event_id, participant_id, existing_registration_id, team_name)
        });

        match &result {
            Ok(registration) => info!(
                "event=registration_join module={} status=ok event_id={} registration_id={} members={} capacity={} duration_ms={}",
                MODULE,
                registration.event_id,
                registration.id,
                registration.member_count(),
                registration.max_team_members,
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("registration_join", MODULE, started_at, err),
        }
        result
    }

    /// Removes `participant_id` from a registration, or deletes the whole
    /// registration when `participant_id` is `None`.
    ///
    /// Solo registrations, and team registrations whose last member leaves,
    /// are deleted.
    ///
    /// # Errors
    /// - `NotFound` for an unknown registration.
    /// - `InvalidState` when the participant is not a member.
    pub fn remove_registration(
        &self,
        registration_id: &str,
        participant_id: Option<&str>,
    ) -> ServiceResult<RemovalOutcome> {
        let started_at = Instant::now();
        let result = run_immediate(self.conn, self.retry, "registration_leave", |tx| {
            leave_unit(tx, registration_id, participant_id)
        });

        match &result {
            Ok(RemovalOutcome::Deleted { registration_id }) => info!(
                "event=registration_leave module={} status=ok outcome=deleted registration_id={} duration_ms={}",
                MODULE,
                registration_id,
                started_at.elapsed().as_millis()
            ),
            Ok(RemovalOutcome::MemberRemoved {
                registration,
                new_owner,
            }) => info!(
                "event=registration_leave module={} status=ok outcome=member_removed registration_id={} members={} owner_changed={} duration_ms={}",
                MODULE,
                registration.id,
                registration.member_count(),
                new_owner.is_some(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("registration_leave", MODULE, started_at, err),
        }
        result
    }

    /// Returns the registration that holds `participant_id` for `event_id`.
    ///
    /// Pure read; an unknown event simply yields `None`.
    pub fn check_registration(
        &self,
        event_id: &str,
        participant_id: &str,
    ) -> ServiceResult<Option<Registration>> {
        run_read(self.conn, |tx| -> ServiceResult<Option<Registration>> {
            SqliteRegistrationRepository::new(tx)
                .find_registration_for_participant(event_id, participant_id)
                .map_err(ServiceError::from)
        })
    }

    /// Lists every registration of an event with its members.
    ///
    /// # Errors
    /// - `NotFound` for an unknown event.
    pub fn list_registrations(&self, event_id: &str) -> ServiceResult<Vec<Registration>> {
        run_read(self.conn, |tx| -> ServiceResult<Vec<Registration>> {
            if SqliteEventRepository::new(tx).get_event(event_id)?.is_none() {
                return Err(ServiceError::not_found(EntityKind::Event, event_id));
            }
            Ok(SqliteRegistrationRepository::new(tx).list_registrations_for_event(event_id)?)
        })
    }
}

fn join_unit(
    tx: &Connection,
    event_id: &str,
    participant_id: &str,
    existing_registration_id: Option<&str>,
    team_name: Option<&str>,
) -> ServiceResult<Registration> {
    let events = SqliteEventRepository::new(tx);
    let participants = SqliteParticipantRepository::new(tx);
    let registrations = SqliteRegistrationRepository::new(tx);

    let event = events
        .get_event(event_id)?
        .ok_or_else(|| ServiceError::not_found(EntityKind::Event, event_id))?;
    if !participants.participant_exists(participant_id)? {
        return Err(ServiceError::not_found(
            EntityKind::Participant,
            participant_id,
        ));
    }
    if registrations
        .find_registration_for_participant(event_id, participant_id)?
        .is_some()
    {
        return Err(ServiceError::AlreadyRegistered {
            event_id: event_id.to_string(),
            participant_id: participant_id.to_string(),
        });
    }

    match existing_registration_id {
        Some(registration_id) => {
            join_existing(&registrations, &event, registration_id, participant_id)
        }
        None => create_for(&registrations, &event, participant_id, team_name),
    }
}

fn leave_unit(
    tx: &Connection,
    registration_id: &str,
    participant_id: Option<&str>,
) -> ServiceResult<RemovalOutcome> {
    let registrations = SqliteRegistrationRepository::new(tx);
    let registration = registrations
        .get_registration(registration_id)?
        .ok_or_else(|| ServiceError::not_found(EntityKind::Registration, registration_id))?;

    let Some(participant_id) = participant_id else {
        registrations.delete_registration(registration_id)?;
        return Ok(deleted(registration_id));
    };

    if !registration.has_member(participant_id) {
        return Err(ServiceError::InvalidState(format!(
            "participant {participant_id} is not a member of registration {registration_id}"
        )));
    }

    if registration.reg_type == ParticipationMode::Solo || registration.member_count() <= 1
    {
        registrations.delete_registration(registration_id)?;
        return Ok(deleted(registration_id));
    }

    let new_owner = if registration.is_owned_by(participant_id) {
        let successor = registration
            .successor_owner(participant_id)
            .cloned()
            .ok_or_else(|| {
                ServiceError::InvalidState(format!(
                    "registration {registration_id} has no remaining member to own it"
                ))
            })?;
        // Owner must stay a member, so hand over before removing.
        registrations.set_owner(registration_id, &successor)?;
        Some(successor)
    } else {
        None
    };
    registrations.remove_member(registration_id, participant_id)?;

    let registration = registrations
        .get_registration(registration_id)?
        .ok_or_else(|| ServiceError::not_found(EntityKind::Registration, registration_id))?;
    Ok(RemovalOutcome::MemberRemoved {
        registration,
        new_owner,
    })
}

fn join_existing(
    registrations: &SqliteRegistrationRepository<'_>,
    event: &Event,
    registration_id: &str,
    participant_id: &str,
) -> ServiceResult<Registration> {
    let registration = registrations
        .get_registration(registration_id)?
        .ok_or_else(|| ServiceError::not_found(EntityKind::Registration, registration_id))?;

    if registration.event_id != event.id {
        return Err(ServiceError::InvalidState(format!(
            "registration {registration_id} belongs to event {}, not {}",
            registration.event_id, event.id
        )));
    }
    if registration.reg_type == ParticipationMode::Solo {
        return Err(ServiceError::InvalidState(format!(
            "registration {registration_id} is a solo registration"
        )));
    }
    if registration.is_full() {
        return Err(ServiceError::TeamFull {
            registration_id: registration.id,
            capacity: registration.max_team_members,
        });
    }

    registrations.add_member(registration_id, participant_id)?;
    registrations
        .get_registration(registration_id)?
        .ok_or_else(|| ServiceError::not_found(EntityKind::Registration, registration_id))
}

fn create_for(
    registrations: &SqliteRegistrationRepository<'_>,
    event: &Event,
    participant_id: &str,
    team_name: Option<&str>,
) -> ServiceResult<Registration> {
    let draft = RegistrationDraft {
        id: Uuid::new_v4().to_string(),
        event_id: event.id.clone(),
        reg_type: event.participation,
        max_team_members: event.max_team_members,
        owner_id: participant_id.to_string(),
        team_name: normalize_optional(team_name),
    };
    Ok(registrations.create_registration(&draft)?)
}

fn deleted(registration_id: &str) -> RemovalOutcome {
    RemovalOutcome::Deleted {
        registration_id: registration_id.to_string(),
    }
}
