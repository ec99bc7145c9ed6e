//! Integration tests for registration, cancellation, and capacity invariants.

use chrono::{Duration, Utc};
use workshopd::error::Error;
use workshopd::model::{NewRegistration, NewWorkshop, Status, WorkshopId};
use workshopd::scheduler::{Scheduler, WorkshopFilter};

fn test_scheduler() -> Scheduler {
    Scheduler::in_memory().expect("failed to create in-memory scheduler")
}

fn upcoming_workshop(scheduler: &mut Scheduler, capacity: u32) -> WorkshopId {
    scheduler
        .add_workshop(NewWorkshop::new(
            "Test Workshop",
            Utc::now() + Duration::days(1),
            60,
            capacity,
        ))
        .unwrap()
        .id
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

#[test]
fn new_workshops_start_upcoming_and_empty() {
    let mut scheduler = test_scheduler();

    let workshop = scheduler
        .add_workshop(
            NewWorkshop::new("Rust Fundamentals", Utc::now() + Duration::days(2), 180, 50)
                .instructor("Priya Sharma")
                .tags(["rust", "beginner"]),
        )
        .unwrap();

    assert_eq!(workshop.status, Status::Upcoming);
    assert_eq!(workshop.capacity.total, 50);
    assert_eq!(workshop.capacity.filled, 0);
    assert_eq!(workshop.tags, vec!["rust", "beginner"]);
}

#[test]
fn zero_duration_or_capacity_is_rejected() {
    let mut scheduler = test_scheduler();
    let start = Utc::now() + Duration::days(1);

    let result = scheduler.add_workshop(NewWorkshop::new("No Duration", start, 0, 10));
    assert!(matches!(result, Err(Error::InvalidRequest(_))));

    let result = scheduler.add_workshop(NewWorkshop::new("No Seats", start, 60, 0));
    assert!(matches!(result, Err(Error::InvalidRequest(_))));
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[test]
fn register_claims_a_seat() {
    let mut scheduler = test_scheduler();
    let id = upcoming_workshop(&mut scheduler, 10);

    let (workshop, registration) = scheduler
        .register(id, NewRegistration::new("user-1").email("u1@example.com"))
        .unwrap();

    assert_eq!(workshop.capacity.filled, 1);
    assert_eq!(registration.workshop_id, id);
    assert_eq!(registration.user_id, "user-1");
    assert_eq!(registration.user_email.as_deref(), Some("u1@example.com"));
}

#[test]
fn register_unknown_workshop_is_not_found() {
    let mut scheduler = test_scheduler();

    let result = scheduler.register(WorkshopId(999), NewRegistration::new("user-1"));
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[test]
fn register_full_workshop_leaves_filled_unchanged() {
    let mut scheduler = test_scheduler();
    let id = upcoming_workshop(&mut scheduler, 1);

    scheduler
        .register(id, NewRegistration::new("user-1"))
        .unwrap();

    let result = scheduler.register(id, NewRegistration::new("user-2"));
    assert!(matches!(result, Err(Error::Full(_))));

    let workshop = scheduler.get_workshop(id).unwrap();
    assert_eq!(workshop.capacity.filled, 1);
}

#[test]
fn second_registration_for_same_user_is_duplicate() {
    let mut scheduler = test_scheduler();
    let id = upcoming_workshop(&mut scheduler, 10);

    scheduler
        .register(id, NewRegistration::new("user-1"))
        .unwrap();

    let result = scheduler.register(id, NewRegistration::new("user-1"));
    assert!(matches!(result, Err(Error::Duplicate { .. })));

    let workshop = scheduler.get_workshop(id).unwrap();
    assert_eq!(workshop.capacity.filled, 1);
}

#[test]
fn registration_for_completed_workshop_is_rejected() {
    let mut scheduler = test_scheduler();
    let now = Utc::now();

    // Window already over: goes completed on the first sweep.
    let id = scheduler
        .add_workshop(NewWorkshop::new(
            "Finished",
            now - Duration::hours(3),
            60,
            10,
        ))
        .unwrap()
        .id;
    scheduler.tick(now).unwrap();
    assert_eq!(scheduler.get_workshop(id).unwrap().status, Status::Completed);

    let result = scheduler.register(id, NewRegistration::new("user-1"));
    assert!(matches!(result, Err(Error::InvalidState { .. })));
}

#[test]
fn registering_for_live_workshop_is_allowed() {
    let mut scheduler = test_scheduler();
    let now = Utc::now();

    let id = scheduler
        .add_workshop(NewWorkshop::new(
            "In Progress",
            now - Duration::minutes(10),
            60,
            10,
        ))
        .unwrap()
        .id;
    scheduler.tick(now).unwrap();
    assert_eq!(scheduler.get_workshop(id).unwrap().status, Status::Live);

    let (workshop, _) = scheduler
        .register(id, NewRegistration::new("late-joiner"))
        .unwrap();
    assert_eq!(workshop.capacity.filled, 1);
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[test]
fn cancel_frees_the_seat_and_removes_the_registration() {
    let mut scheduler = test_scheduler();
    let id = upcoming_workshop(&mut scheduler, 10);

    scheduler
        .register(id, NewRegistration::new("user-1"))
        .unwrap();
    let workshop = scheduler.cancel(id, "user-1").unwrap();

    assert_eq!(workshop.capacity.filled, 0);
    assert!(scheduler.workshops_for_user("user-1").unwrap().is_empty());

    // Seat is free again for the same user
    let (workshop, _) = scheduler
        .register(id, NewRegistration::new("user-1"))
        .unwrap();
    assert_eq!(workshop.capacity.filled, 1);
}

#[test]
fn cancel_without_registration_is_not_found() {
    let mut scheduler = test_scheduler();
    let id = upcoming_workshop(&mut scheduler, 10);

    let result = scheduler.cancel(id, "nobody");
    assert!(matches!(result, Err(Error::NotFound(_))));

    let workshop = scheduler.get_workshop(id).unwrap();
    assert_eq!(workshop.capacity.filled, 0);
}

// ---------------------------------------------------------------------------
// Capacity invariant
// ---------------------------------------------------------------------------

#[test]
fn filled_stays_within_bounds_across_mixed_sequences() {
    let mut scheduler = test_scheduler();
    let id = upcoming_workshop(&mut scheduler, 3);

    for round in 0..5 {
        for user in 0..4 {
            let _ = scheduler.register(id, NewRegistration::new(format!("user-{user}")));
            let workshop = scheduler.get_workshop(id).unwrap();
            assert!(workshop.capacity.filled <= workshop.capacity.total);
        }
        for user in 0..4 {
            let _ = scheduler.cancel(id, &format!("user-{user}"));
            let workshop = scheduler.get_workshop(id).unwrap();
            assert!(workshop.capacity.filled <= workshop.capacity.total);
        }
        let workshop = scheduler.get_workshop(id).unwrap();
        assert_eq!(workshop.capacity.filled, 0, "round {round} left seats claimed");
    }
}

#[test]
fn interleaved_registrations_never_overbook() {
    use std::sync::{Arc, Mutex};

    let scheduler = Arc::new(Mutex::new(test_scheduler()));
    let id = {
        let mut s = scheduler.lock().unwrap();
        upcoming_workshop(&mut s, 10)
    };

    let mut handles = Vec::new();
    for i in 0..32 {
        let scheduler = Arc::clone(&scheduler);
        handles.push(std::thread::spawn(move || {
            let mut s = scheduler.lock().unwrap();
            s.register(id, NewRegistration::new(format!("user-{i}")))
                .map(|_| ())
        }));
    }

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let ok = results.iter().filter(|r| r.is_ok()).count();
    let full = results
        .iter()
        .filter(|r| matches!(r, Err(Error::Full(_))))
        .count();

    assert_eq!(ok, 10);
    assert_eq!(full, 22);

    let workshop = scheduler.lock().unwrap().get_workshop(id).unwrap();
    assert_eq!(workshop.capacity.filled, 10);
}

// ---------------------------------------------------------------------------
// Catalog queries
// ---------------------------------------------------------------------------

#[test]
fn list_filters_by_status_and_search() {
    let mut scheduler = test_scheduler();
    let now = Utc::now();

    scheduler
        .add_workshop(
            NewWorkshop::new("Rust Fundamentals", now + Duration::days(1), 60, 10).tags(["rust"]),
        )
        .unwrap();
    scheduler
        .add_workshop(
            NewWorkshop::new("API Design", now + Duration::days(2), 60, 10).tags(["backend"]),
        )
        .unwrap();

    let all = scheduler.list_workshops(&WorkshopFilter::default()).unwrap();
    assert_eq!(all.len(), 2);

    let upcoming = scheduler
        .list_workshops(&WorkshopFilter {
            status: Some(Status::Upcoming),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(upcoming.len(), 2);

    let rust = scheduler
        .list_workshops(&WorkshopFilter {
            search: Some("rust".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(rust.len(), 1);
    assert_eq!(rust[0].title, "Rust Fundamentals");

    let tagged = scheduler
        .list_workshops(&WorkshopFilter {
            tag: Some("backend".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].title, "API Design");
}

#[test]
fn stats_and_tags_aggregate_the_catalog() {
    let mut scheduler = test_scheduler();
    let now = Utc::now();

    scheduler
        .add_workshop(NewWorkshop::new("A", now + Duration::days(1), 60, 10).tags(["rust", "api"]))
        .unwrap();
    scheduler
        .add_workshop(NewWorkshop::new("B", now + Duration::days(2), 60, 20).tags(["api"]))
        .unwrap();

    let stats = scheduler.stats().unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.upcoming, 2);
    assert_eq!(stats.total_capacity, 30);
    assert_eq!(stats.total_enrolled, 0);

    assert_eq!(scheduler.tags().unwrap(), vec!["api", "rust"]);
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[test]
fn register_and_cancel_append_notifications() {
    let mut scheduler = test_scheduler();
    let id = upcoming_workshop(&mut scheduler, 10);

    scheduler
        .register(id, NewRegistration::new("user-1"))
        .unwrap();
    scheduler.cancel(id, "user-1").unwrap();

    let notifications = scheduler.notifications_for_user("user-1").unwrap();
    assert_eq!(notifications.len(), 2);
    assert!(notifications.iter().all(|n| !n.read));

    scheduler
        .mark_notification_read(notifications[0].id)
        .unwrap();
    let notifications = scheduler.notifications_for_user("user-1").unwrap();
    assert_eq!(notifications.iter().filter(|n| n.read).count(), 1);
}

#[test]
fn marking_unknown_notification_read_is_not_found() {
    let mut scheduler = test_scheduler();
    let result = scheduler.mark_notification_read(42);
    assert!(matches!(result, Err(Error::NotFound(_))));
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[test]
fn operations_record_events_with_monotonic_seq() {
    let mut scheduler = test_scheduler();
    let id = upcoming_workshop(&mut scheduler, 10);

    scheduler
        .register(id, NewRegistration::new("user-1"))
        .unwrap();
    scheduler.cancel(id, "user-1").unwrap();

    let events = scheduler.events_since(0).unwrap();

    // At least created, registered, cancelled
    assert!(events.len() >= 3);
    for window in events.windows(2) {
        assert!(window[1].seq > window[0].seq);
    }
}
