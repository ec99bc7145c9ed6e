//! Integration tests for the lifecycle sweep.
//!
//! `tick` takes the current time as an argument, so these tests drive the
//! clock explicitly instead of sleeping.

use chrono::{DateTime, Duration, Utc};
use workshopd::event::EventKind;
use workshopd::model::{NewWorkshop, Status, WorkshopId};
use workshopd::scheduler::Scheduler;

fn test_scheduler() -> Scheduler {
    Scheduler::in_memory().expect("failed to create in-memory scheduler")
}

fn add_workshop(
    scheduler: &mut Scheduler,
    start: DateTime<Utc>,
    duration_minutes: u32,
) -> WorkshopId {
    scheduler
        .add_workshop(NewWorkshop::new("Timed Workshop", start, duration_minutes, 10))
        .unwrap()
        .id
}

// ---------------------------------------------------------------------------
// Forward transitions
// ---------------------------------------------------------------------------

#[test]
fn workshop_inside_its_window_goes_live() {
    let mut scheduler = test_scheduler();
    let now = Utc::now();
    let id = add_workshop(&mut scheduler, now - Duration::minutes(10), 60);

    let events = scheduler.tick(now).unwrap();

    assert_eq!(events.len(), 1);
    assert!(matches!(events[0].kind, EventKind::WentLive { id: e } if e == id));
    assert_eq!(scheduler.get_workshop(id).unwrap().status, Status::Live);
}

#[test]
fn live_workshop_completes_after_its_window() {
    let mut scheduler = test_scheduler();
    let now = Utc::now();
    let start = now - Duration::minutes(10);
    let id = add_workshop(&mut scheduler, start, 60);

    scheduler.tick(now).unwrap();
    assert_eq!(scheduler.get_workshop(id).unwrap().status, Status::Live);

    let events = scheduler.tick(start + Duration::minutes(70)).unwrap();

    assert_eq!(events.len(), 1);
    assert!(matches!(events[0].kind, EventKind::Completed { id: e } if e == id));
    assert_eq!(scheduler.get_workshop(id).unwrap().status, Status::Completed);
}

#[test]
fn workshop_before_its_window_stays_upcoming() {
    let mut scheduler = test_scheduler();
    let now = Utc::now();
    let id = add_workshop(&mut scheduler, now + Duration::hours(1), 60);

    let events = scheduler.tick(now).unwrap();

    assert!(events.is_empty());
    assert_eq!(scheduler.get_workshop(id).unwrap().status, Status::Upcoming);
}

#[test]
fn skipped_window_goes_straight_to_completed() {
    let mut scheduler = test_scheduler();
    let now = Utc::now();

    // Whole live window fell between sweeps: never stuck upcoming.
    let id = add_workshop(&mut scheduler, now - Duration::hours(2), 15);

    let events = scheduler.tick(now).unwrap();

    assert_eq!(events.len(), 1);
    assert!(matches!(events[0].kind, EventKind::Completed { id: e } if e == id));
    assert_eq!(scheduler.get_workshop(id).unwrap().status, Status::Completed);
}

#[test]
fn window_is_inclusive_at_both_ends() {
    let mut scheduler = test_scheduler();
    let start = Utc::now() + Duration::hours(1);
    let end = start + Duration::minutes(60);

    let at_start = add_workshop(&mut scheduler, start, 60);
    scheduler.tick(start).unwrap();
    assert_eq!(
        scheduler.get_workshop(at_start).unwrap().status,
        Status::Live
    );

    let at_end = add_workshop(&mut scheduler, start, 60);
    scheduler.tick(end).unwrap();
    assert_eq!(scheduler.get_workshop(at_end).unwrap().status, Status::Live);

    scheduler.tick(end + Duration::seconds(1)).unwrap();
    assert_eq!(
        scheduler.get_workshop(at_start).unwrap().status,
        Status::Completed
    );
    assert_eq!(
        scheduler.get_workshop(at_end).unwrap().status,
        Status::Completed
    );
}

// ---------------------------------------------------------------------------
// Monotonicity
// ---------------------------------------------------------------------------

#[test]
fn completed_workshop_never_reverts_under_clock_skew() {
    let mut scheduler = test_scheduler();
    let now = Utc::now();
    let start = now - Duration::hours(2);
    let id = add_workshop(&mut scheduler, start, 15);

    scheduler.tick(now).unwrap();
    assert_eq!(scheduler.get_workshop(id).unwrap().status, Status::Completed);

    // Clock jumps back before the start: status must not move.
    let events = scheduler.tick(start - Duration::hours(1)).unwrap();
    assert!(events.is_empty());
    assert_eq!(scheduler.get_workshop(id).unwrap().status, Status::Completed);

    // And back inside the window: still completed.
    let events = scheduler.tick(start + Duration::minutes(5)).unwrap();
    assert!(events.is_empty());
    assert_eq!(scheduler.get_workshop(id).unwrap().status, Status::Completed);
}

#[test]
fn live_workshop_never_reverts_under_clock_skew() {
    let mut scheduler = test_scheduler();
    let now = Utc::now();
    let start = now - Duration::minutes(10);
    let id = add_workshop(&mut scheduler, start, 60);

    scheduler.tick(now).unwrap();
    assert_eq!(scheduler.get_workshop(id).unwrap().status, Status::Live);

    let events = scheduler.tick(start - Duration::hours(1)).unwrap();
    assert!(events.is_empty());
    assert_eq!(scheduler.get_workshop(id).unwrap().status, Status::Live);
}

// ---------------------------------------------------------------------------
// Sweep behavior
// ---------------------------------------------------------------------------

#[test]
fn one_sweep_transitions_every_due_workshop() {
    let mut scheduler = test_scheduler();
    let now = Utc::now();

    let going_live = add_workshop(&mut scheduler, now - Duration::minutes(5), 60);
    let completing = add_workshop(&mut scheduler, now - Duration::hours(3), 30);
    let waiting = add_workshop(&mut scheduler, now + Duration::hours(1), 60);

    let events = scheduler.tick(now).unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(
        scheduler.get_workshop(going_live).unwrap().status,
        Status::Live
    );
    assert_eq!(
        scheduler.get_workshop(completing).unwrap().status,
        Status::Completed
    );
    assert_eq!(
        scheduler.get_workshop(waiting).unwrap().status,
        Status::Upcoming
    );
}

#[test]
fn repeated_sweeps_are_idempotent() {
    let mut scheduler = test_scheduler();
    let now = Utc::now();
    let id = add_workshop(&mut scheduler, now - Duration::minutes(10), 60);

    assert_eq!(scheduler.tick(now).unwrap().len(), 1);
    assert_eq!(scheduler.tick(now).unwrap().len(), 0);
    assert_eq!(scheduler.tick(now).unwrap().len(), 0);
    assert_eq!(scheduler.get_workshop(id).unwrap().status, Status::Live);
}

#[test]
fn transitions_land_in_the_event_log() {
    let mut scheduler = test_scheduler();
    let now = Utc::now();
    let start = now - Duration::minutes(10);
    add_workshop(&mut scheduler, start, 60);

    scheduler.tick(now).unwrap();
    scheduler.tick(start + Duration::minutes(90)).unwrap();

    let events = scheduler.events_since(0).unwrap();
    let lifecycle: Vec<_> = events
        .iter()
        .filter_map(|e| e.kind.status().map(|s| (e.seq, s)))
        .collect();

    assert_eq!(lifecycle.len(), 2);
    assert_eq!(lifecycle[0].1, Status::Live);
    assert_eq!(lifecycle[1].1, Status::Completed);
    assert!(lifecycle[0].0 < lifecycle[1].0);
}
