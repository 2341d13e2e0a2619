use rollcall_core::db::open_db_in_memory;
use rollcall_core::repo::event_repo::{EventRepository, SqliteEventRepository};
use rollcall_core::repo::organization_repo::{OrganizationRepository, SqliteOrganizationRepository};
use rollcall_core::{
    Actor, CascadeReport, CascadeService, EventService, MembershipService, NewEvent,
    NewOrganization, NewParticipant, OrganizationService, RepoError,
};
use rusqlite::Connection;

fn setup() -> Connection {
    let conn = open_db_in_memory().unwrap();
    let organizations = OrganizationService::try_new(&conn).unwrap();
    for (id, name) in [("nexus", "Nexus Club"), ("acm", "ACM Chapter")] {
        organizations
            .create_organization(&Actor::Admin, &NewOrganization::new(id, name))
            .unwrap();
    }
    for id in ["p1", "p2", "p3"] {
        organizations
            .register_participant(&NewParticipant::new(id, "Member"))
            .unwrap();
    }
    conn
}

/// Creates a team event with two registrations (`{p1, p2}` and `{p3}`).
fn populated_event(conn: &Connection, organization_id: &str) -> String {
    let event = EventService::try_new(conn)
        .unwrap()
        .create_event(
            &Actor::Admin,
            &NewEvent::team(organization_id, "Hack Night", 1_700_000_000_000, 3),
        )
        .unwrap();
    let membership = MembershipService::try_new(conn).unwrap();
    let team = membership
        .add_registration(&event.id, "p1", None, None)
        .unwrap();
    membership
        .add_registration(&event.id, "p2", Some(&team.id), None)
        .unwrap();
    membership.add_registration(&event.id, "p3", None, None).unwrap();
    event.id
}

fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

fn assert_no_orphans(conn: &Connection) {
    assert_eq!(
        count(
            conn,
            "SELECT COUNT(*) FROM registrations r
             WHERE NOT EXISTS (SELECT 1 FROM events e WHERE e.id = r.event_id);"
        ),
        0
    );
    assert_eq!(
        count(
            conn,
            "SELECT COUNT(*) FROM registration_members m
             WHERE NOT EXISTS (SELECT 1 FROM registrations r WHERE r.id = m.registration_id);"
        ),
        0
    );
    assert_eq!(
        count(
            conn,
            "SELECT COUNT(*) FROM events e
             WHERE NOT EXISTS (SELECT 1 FROM organizations o WHERE o.id = e.organization_id);"
        ),
        0
    );
}

#[test]
fn delete_event_removes_registrations_then_event() {
    let conn = setup();
    let event_id = populated_event(&conn, "nexus");
    let cascade = CascadeService::try_new(&conn).unwrap();

    let report = cascade.delete_event(&event_id).unwrap();
    assert_eq!(
        report,
        CascadeReport {
            events_deleted: 1,
            registrations_deleted: 2,
            root_deleted: true,
        }
    );
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM registrations;"), 0);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM registration_members;"), 0);
    assert!(SqliteEventRepository::try_new(&conn)
        .unwrap()
        .get_event(&event_id)
        .unwrap()
        .is_none());

    let membership = MembershipService::try_new(&conn).unwrap();
    assert!(membership.check_registration(&event_id, "p1").unwrap().is_none());
}

#[test]
fn delete_event_twice_is_a_noop() {
    let conn = setup();
    let event_id = populated_event(&conn, "nexus");
    let cascade = CascadeService::try_new(&conn).unwrap();

    cascade.delete_event(&event_id).unwrap();
    let again = cascade.delete_event(&event_id).unwrap();
    assert_eq!(again, CascadeReport::default());
}

#[test]
fn bare_event_delete_with_registrations_is_rejected_by_store() {
    let conn = setup();
    let event_id = populated_event(&conn, "nexus");
    let events = SqliteEventRepository::try_new(&conn).unwrap();

    let err = events.delete_event(&event_id).unwrap_err();
    assert!(matches!(err, RepoError::ConstraintViolation(_)));
    assert!(events.get_event(&event_id).unwrap().is_some());
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM registrations;"), 2);
}

#[test]
fn delete_organization_removes_every_event_and_registration() {
    let conn = setup();
    populated_event(&conn, "nexus");
    EventService::try_new(&conn)
        .unwrap()
        .create_event(&Actor::Admin, &NewEvent::solo("nexus", "Quiz", 0))
        .unwrap();
    let kept_event = EventService::try_new(&conn)
        .unwrap()
        .create_event(&Actor::Admin, &NewEvent::solo("acm", "Talk", 0))
        .unwrap();

    let report = CascadeService::try_new(&conn)
        .unwrap()
        .delete_organization("nexus")
        .unwrap();
    assert_eq!(report.events_deleted, 2);
    assert_eq!(report.registrations_deleted, 2);
    assert!(report.root_deleted);

    let organizations = SqliteOrganizationRepository::try_new(&conn).unwrap();
    assert!(organizations.get_organization("nexus").unwrap().is_none());
    assert!(organizations.get_organization("acm").unwrap().is_some());
    let remaining: Vec<String> = SqliteEventRepository::try_new(&conn)
        .unwrap()
        .list_public_events()
        .unwrap()
        .into_iter()
        .map(|event| event.id)
        .collect();
    assert_eq!(remaining, vec![kept_event.id]);
    assert_no_orphans(&conn);
}

#[test]
fn delete_organization_finishes_partial_cascade() {
    let conn = setup();
    let first = populated_event(&conn, "nexus");
    let cascade = CascadeService::try_new(&conn).unwrap();

    // Simulates a run interrupted after its first event.
    cascade.delete_event(&first).unwrap();
    EventService::try_new(&conn)
        .unwrap()
        .create_event(&Actor::Admin, &NewEvent::solo("nexus", "Late addition", 0))
        .unwrap();

    let report = cascade.delete_organization("nexus").unwrap();
    assert_eq!(report.events_deleted, 1);
    assert_eq!(report.registrations_deleted, 0);
    assert!(report.root_deleted);

    let again = cascade.delete_organization("nexus").unwrap();
    assert_eq!(again, CascadeReport::default());
    assert_no_orphans(&conn);
}

#[test]
fn bare_organization_delete_with_events_is_rejected_by_store() {
    let conn = setup();
    EventService::try_new(&conn)
        .unwrap()
        .create_event(&Actor::Admin, &NewEvent::solo("nexus", "Quiz", 0))
        .unwrap();

    let err = SqliteOrganizationRepository::try_new(&conn)
        .unwrap()
        .delete_organization("nexus")
        .unwrap_err();
    assert!(matches!(err, RepoError::ConstraintViolation(_)));
}
