use rollcall_core::db::open_db_in_memory;
use rollcall_core::{
    Actor, CascadeReport, EntityKind, EventService, EventUpdate, MembershipService,
    ModelValidationError, NewEvent, NewOrganization, NewParticipant, OrganizationLink,
    OrganizationService, ParticipationMode, ServiceError,
};
use rusqlite::Connection;
use serde_json::json;

fn setup() -> Connection {
    let conn = open_db_in_memory().unwrap();
    let organizations = OrganizationService::try_new(&conn).unwrap();
    organizations
        .create_organization(&Actor::Admin, &NewOrganization::new("nexus", "Nexus Club"))
        .unwrap();
    organizations
        .create_organization(&Actor::Admin, &NewOrganization::new("acm", "ACM Chapter"))
        .unwrap();
    conn
}

fn nexus() -> Actor {
    Actor::Organization("nexus".to_string())
}

#[test]
fn only_admin_creates_organizations_and_handles_are_unique() {
    let conn = setup();
    let service = OrganizationService::try_new(&conn).unwrap();

    let err = service
        .create_organization(&nexus(), &NewOrganization::new("gdsc", "GDSC"))
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let err = service
        .create_organization(&Actor::Admin, &NewOrganization::new("nexus", "Again"))
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    let err = service
        .create_organization(&Actor::Admin, &NewOrganization::new("  ", "Blank"))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ModelValidationError::BlankField { field: "id" })
    ));

    let names: Vec<String> = service
        .list_organizations()
        .unwrap()
        .into_iter()
        .map(|organization| organization.name)
        .collect();
    assert_eq!(names, vec!["ACM Chapter", "Nexus Club"]);
}

#[test]
fn organization_edits_itself_but_not_others() {
    let conn = setup();
    let service = OrganizationService::try_new(&conn).unwrap();

    let renamed = service
        .rename_organization(&nexus(), "nexus", "Nexus Society")
        .unwrap();
    assert_eq!(renamed.name, "Nexus Society");

    let links = vec![
        OrganizationLink {
            label: "Site".to_string(),
            url: "https://nexus.example".to_string(),
            icon: "globe".to_string(),
        },
        OrganizationLink {
            label: "Chat".to_string(),
            url: "https://chat.example/nexus".to_string(),
            icon: "chat".to_string(),
        },
    ];
    let updated = service.update_links(&nexus(), "nexus", &links).unwrap();
    assert_eq!(updated.links, links);

    let err = service
        .rename_organization(&nexus(), "acm", "Taken Over")
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
    let err = service
        .delete_organization(&Actor::Participant("p1".to_string()), "nexus")
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[test]
fn invalid_link_is_rejected() {
    let conn = setup();
    let service = OrganizationService::try_new(&conn).unwrap();
    let links = vec![OrganizationLink {
        label: String::new(),
        url: "https://example.com".to_string(),
        icon: String::new(),
    }];

    let err = service.update_links(&nexus(), "nexus", &links).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ModelValidationError::InvalidLink { index: 0 })
    ));
}

#[test]
fn participant_registration_is_an_upsert() {
    let conn = setup();
    let service = OrganizationService::try_new(&conn).unwrap();
    assert!(!service.participant_exists("prn-042").unwrap());

    service
        .register_participant(&NewParticipant::new("prn-042", "Ada"))
        .unwrap();
    let mut refreshed = NewParticipant::new("prn-042", "Ada L.");
    refreshed.email = Some("ada@example.com".to_string());
    let participant = service.register_participant(&refreshed).unwrap();

    assert!(service.participant_exists("prn-042").unwrap());
    assert_eq!(participant.display_name, "Ada L.");
    assert_eq!(participant.email.as_deref(), Some("ada@example.com"));
}

#[test]
fn event_creation_is_authorized_and_validated() {
    let conn = setup();
    let service = EventService::try_new(&conn).unwrap();

    let err = service
        .create_event(&nexus(), &NewEvent::solo("acm", "Talk", 0))
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let err = service
        .create_event(&Actor::Admin, &NewEvent::team("nexus", "Relay", 0, 0))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ModelValidationError::InvalidCapacity(0))
    ));

    let err = service
        .create_event(&Actor::Admin, &NewEvent::solo("ghost", "Talk", 0))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::NotFound {
            kind: EntityKind::Organization,
            ..
        }
    ));

    let mut event = NewEvent::team("nexus", "Hack Night", 1_700_000_000_000, 4);
    event.category = "hackathon".to_string();
    event.access_password = Some("letmein".to_string());
    event.extra_questions = Some(json!([{"label": "GitHub handle", "required": true}]));
    let created = service.create_event(&nexus(), &event).unwrap();
    assert_eq!(created.participation, ParticipationMode::Team);
    assert_eq!(created.category, "hackathon");
    assert_eq!(created.extra_questions, event.extra_questions);

    let serialized = serde_json::to_value(&created).unwrap();
    assert!(serialized.get("access_password").is_none());
}

#[test]
fn event_update_and_image_require_owner() {
    let conn = setup();
    let service = EventService::try_new(&conn).unwrap();
    let event = service
        .create_event(&nexus(), &NewEvent::solo("nexus", "Quiz", 10))
        .unwrap();

    let mut update = EventUpdate::from_event(&event);
    update.name = "Grand Quiz".to_string();
    update.is_public = false;
    let err = service
        .update_event(&Actor::Organization("acm".to_string()), &event.id, &update)
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let updated = service.update_event(&nexus(), &event.id, &update).unwrap();
    assert_eq!(updated.name, "Grand Quiz");
    assert!(!updated.is_public);
    assert!(service.list_public_events().unwrap().is_empty());

    let with_image = service
        .set_event_image(&nexus(), &event.id, Some("events/quiz.png"))
        .unwrap();
    assert_eq!(with_image.image_ref.as_deref(), Some("events/quiz.png"));
    let cleared = service.set_event_image(&nexus(), &event.id, None).unwrap();
    assert_eq!(cleared.image_ref, None);

    let err = service
        .update_event(&nexus(), "missing", &update)
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));
}

#[test]
fn event_listings_are_ordered_by_date() {
    let conn = setup();
    let service = EventService::try_new(&conn).unwrap();
    let late = service
        .create_event(&nexus(), &NewEvent::solo("nexus", "Late", 300))
        .unwrap();
    let early = service
        .create_event(&nexus(), &NewEvent::solo("nexus", "Early", 100))
        .unwrap();
    let other = service
        .create_event(&Actor::Admin, &NewEvent::solo("acm", "Middle", 200))
        .unwrap();

    let by_org: Vec<String> = service
        .list_events_for_organization("nexus")
        .unwrap()
        .into_iter()
        .map(|event| event.id)
        .collect();
    assert_eq!(by_org, vec![early.id.clone(), late.id.clone()]);

    let public: Vec<String> = service
        .list_public_events()
        .unwrap()
        .into_iter()
        .map(|event| event.id)
        .collect();
    assert_eq!(public, vec![early.id, other.id, late.id]);
}

#[test]
fn overview_and_delete_go_through_cascade() {
    let conn = setup();
    let organizations = OrganizationService::try_new(&conn).unwrap();
    organizations
        .register_participant(&NewParticipant::new("p1", "Member"))
        .unwrap();
    let events = EventService::try_new(&conn).unwrap();
    let event = events
        .create_event(&nexus(), &NewEvent::team("nexus", "Relay", 0, 2))
        .unwrap();
    let registration = MembershipService::try_new(&conn)
        .unwrap()
        .add_registration(&event.id, "p1", None, None)
        .unwrap();

    let overview = events.event_overview(&event.id).unwrap();
    assert_eq!(overview.event.id, event.id);
    assert_eq!(overview.registrations, vec![registration]);

    let err = events
        .delete_event(&Actor::Organization("acm".to_string()), &event.id)
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let report = events.delete_event(&nexus(), &event.id).unwrap();
    assert_eq!(report.registrations_deleted, 1);
    assert!(report.root_deleted);
    assert_eq!(
        events.delete_event(&nexus(), &event.id).unwrap(),
        CascadeReport::default()
    );
    assert!(matches!(
        events.event_overview(&event.id).unwrap_err(),
        ServiceError::NotFound { .. }
    ));
}

#[test]
fn organization_may_delete_itself() {
    let conn = setup();
    EventService::try_new(&conn)
        .unwrap()
        .create_event(&nexus(), &NewEvent::solo("nexus", "Quiz", 0))
        .unwrap();
    let service = OrganizationService::try_new(&conn).unwrap();

    let report = service.delete_organization(&nexus(), "nexus").unwrap();
    assert!(report.root_deleted);
    assert_eq!(report.events_deleted, 1);
    assert!(service.get_organization("nexus").unwrap().is_none());
}
