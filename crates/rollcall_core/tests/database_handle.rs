use rollcall_core::db::{database, init_database, ConnectionSettings, DbError};
use rollcall_core::{MembershipService, ServiceError};
use std::thread;

// One test per binary: the handle is process-wide.
#[test]
fn handle_initializes_once_and_lends_per_thread_connections() {
    assert!(database().is_none());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rollcall.sqlite3");

    let handle = init_database(&path, ConnectionSettings::default()).unwrap();
    let again = init_database(&path, ConnectionSettings::default()).unwrap();
    assert!(std::ptr::eq(handle, again));
    assert_eq!(database().unwrap().path(), path.as_path());

    let err = init_database(dir.path().join("other.sqlite3"), ConnectionSettings::default())
        .unwrap_err();
    assert!(matches!(err, DbError::HandleConflict { .. }));

    let workers: Vec<_> = (0..4)
        .map(|_| {
            thread::spawn(|| {
                let db = database().unwrap();
                db.with_connection(|conn| -> Result<(), ServiceError> {
                    let service = MembershipService::try_new(conn)?;
                    assert!(service.check_registration("none", "nobody")?.is_none());
                    Ok(())
                })
                .unwrap();
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
}
