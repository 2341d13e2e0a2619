use rollcall_core::db::open_db;
use rollcall_core::{
    Actor, EventService, MembershipService, NewEvent, NewOrganization, NewParticipant,
    OrganizationService, RemovalOutcome, ServiceError,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;

const CAPACITY: u32 = 4;

struct Fixture {
    _dir: tempfile::TempDir,
    path: PathBuf,
    event_id: String,
    registration_id: String,
}

/// Team event with `CAPACITY` seats, one already taken by owner `p00`.
fn seeded_team(joiners: usize) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rollcall.sqlite3");
    let conn = open_db(&path).unwrap();

    let organizations = OrganizationService::try_new(&conn).unwrap();
    organizations
        .create_organization(&Actor::Admin, &NewOrganization::new("nexus", "Nexus Club"))
        .unwrap();
    for index in 0..=joiners {
        organizations
            .register_participant(&NewParticipant::new(participant(index), "Racer"))
            .unwrap();
    }
    let event = EventService::try_new(&conn)
        .unwrap()
        .create_event(
            &Actor::Admin,
            &NewEvent::team("nexus", "Relay", 1_700_000_000_000, CAPACITY),
        )
        .unwrap();
    let registration = MembershipService::try_new(&conn)
        .unwrap()
        .add_registration(&event.id, &participant(0), None, None)
        .unwrap();

    Fixture {
        _dir: dir,
        path,
        event_id: event.id,
        registration_id: registration.id,
    }
}

fn participant(index: usize) -> String {
    format!("p{index:02}")
}

fn join_from_threads(fixture: &Fixture, joiners: usize) -> Vec<Result<(), ServiceError>> {
    let barrier = Arc::new(Barrier::new(joiners));
    let handles: Vec<_> = (1..=joiners)
        .map(|index| {
            let barrier = Arc::clone(&barrier);
            let path = fixture.path.clone();
            let event_id = fixture.event_id.clone();
            let registration_id = fixture.registration_id.clone();
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let service = MembershipService::try_new(&conn).unwrap();
                barrier.wait();
                service
                    .add_registration(&event_id, &participant(index), Some(&registration_id), None)
                    .map(|_| ())
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect()
}

fn member_count(path: &Path, registration_id: &str) -> i64 {
    let conn = open_db(path).unwrap();
    conn.query_row(
        "SELECT COUNT(*) FROM registration_members WHERE registration_id = ?1;",
        [registration_id],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn racing_joins_never_exceed_capacity() {
    let free_seats = (CAPACITY - 1) as usize;
    let joiners = free_seats + 1;
    let fixture = seeded_team(joiners);

    let results = join_from_threads(&fixture, joiners);

    let succeeded = results.iter().filter(|result| result.is_ok()).count();
    let team_full = results
        .iter()
        .filter(|result| matches!(result, Err(ServiceError::TeamFull { .. })))
        .count();
    assert_eq!(succeeded, free_seats);
    assert_eq!(team_full, 1);
    assert_eq!(
        member_count(&fixture.path, &fixture.registration_id),
        i64::from(CAPACITY)
    );
}

#[test]
fn oversubscribed_team_fills_exactly() {
    let joiners = 10;
    let fixture = seeded_team(joiners);

    let results = join_from_threads(&fixture, joiners);

    let succeeded = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(succeeded, (CAPACITY - 1) as usize);
    assert!(results
        .iter()
        .filter_map(|result| result.as_ref().err())
        .all(|err| matches!(err, ServiceError::TeamFull { .. })));
    assert_eq!(
        member_count(&fixture.path, &fixture.registration_id),
        i64::from(CAPACITY)
    );
}

#[test]
fn racing_leaves_keep_a_member_as_owner() {
    let joiners = (CAPACITY - 1) as usize;
    let fixture = seeded_team(joiners);
    assert!(join_from_threads(&fixture, joiners)
        .iter()
        .all(Result::is_ok));

    // Everyone but the last member leaves at once, owner included.
    let leavers = CAPACITY as usize - 1;
    let barrier = Arc::new(Barrier::new(leavers));
    let handles: Vec<_> = (0..leavers)
        .map(|index| {
            let barrier = Arc::clone(&barrier);
            let path = fixture.path.clone();
            let registration_id = fixture.registration_id.clone();
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let service = MembershipService::try_new(&conn).unwrap();
                barrier.wait();
                service
                    .remove_registration(&registration_id, Some(&participant(index)))
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert!(matches!(
            handle.join().unwrap(),
            RemovalOutcome::MemberRemoved { .. }
        ));
    }

    let conn = open_db(&fixture.path).unwrap();
    let last = participant(leavers);
    let registration = MembershipService::try_new(&conn)
        .unwrap()
        .check_registration(&fixture.event_id, &last)
        .unwrap()
        .unwrap();
    assert_eq!(registration.members, vec![last.clone()]);
    assert_eq!(registration.owner_id, last);
}
