//! Core scheduler. The public API for the workshop catalog.
//!
//! The scheduler owns the store and the event bus. All status transitions
//! and capacity changes go through here; callers share it behind a mutex so
//! registration's check-then-increment and the lifecycle sweep serialize
//! against each other.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use serde::Serialize;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::event::{Event, EventBus, EventKind};
use crate::model::*;
use crate::store::Store;
use crate::telemetry::{lifecycle, metrics};

/// The workshop scheduler. Owns all state and enforces all invariants.
pub struct Scheduler {
    store: Store,
    bus: EventBus,
}

/// Shared handle: one logical owner, all access serialized.
pub type SharedScheduler = Arc<Mutex<Scheduler>>;

/// Catalog query filter. Everything optional; filters compose.
#[derive(Debug, Default, Clone)]
pub struct WorkshopFilter {
    pub status: Option<Status>,
    /// Case-insensitive match over title, description, instructor, and tags.
    pub search: Option<String>,
    /// Exact tag match.
    pub tag: Option<String>,
}

/// Catalog aggregates.
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total: usize,
    pub upcoming: usize,
    pub live: usize,
    pub completed: usize,
    pub total_capacity: u64,
    pub total_enrolled: u64,
}

impl Scheduler {
    /// Create a scheduler over an in-memory store.
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            store: Store::in_memory()?,
            bus: EventBus::default(),
        })
    }

    /// Create a scheduler backed by a file.
    pub fn open(path: &str) -> Result<Self> {
        Ok(Self {
            store: Store::open(path)?,
            bus: EventBus::default(),
        })
    }

    /// Handle to the event fan-out, for subscribers outside the lock.
    pub fn bus(&self) -> EventBus {
        self.bus.clone()
    }

    pub fn into_shared(self) -> SharedScheduler {
        Arc::new(Mutex::new(self))
    }

    // -----------------------------------------------------------------------
    // Catalog
    // -----------------------------------------------------------------------

    /// Add a workshop. New entries always start out upcoming; the next
    /// lifecycle sweep settles backdated schedules.
    pub fn add_workshop(&mut self, new: NewWorkshop) -> Result<Workshop> {
        if new.duration_minutes == 0 {
            return Err(Error::InvalidRequest("duration must be positive".into()));
        }
        if new.capacity_total == 0 {
            return Err(Error::InvalidRequest("capacity must be positive".into()));
        }

        let now = Utc::now();
        let (workshop, event) = self.store.with_transaction(|ctx| {
            let workshop = ctx.insert_workshop(&new, now)?;
            let event = ctx.record_event(EventKind::WorkshopCreated {
                id: workshop.id,
                title: workshop.title.clone(),
            })?;
            Ok((workshop, event))
        })?;

        info!(id = %workshop.id, title = %workshop.title, "workshop created");
        self.bus.publish(event);
        Ok(workshop)
    }

    /// Get a workshop by ID.
    pub fn get_workshop(&self, id: WorkshopId) -> Result<Workshop> {
        self.store.get_workshop(id)
    }

    /// List workshops matching a filter, ordered by start time.
    pub fn list_workshops(&self, filter: &WorkshopFilter) -> Result<Vec<Workshop>> {
        let mut workshops = self.store.list_workshops(filter.status)?;

        if let Some(ref search) = filter.search {
            let term = search.to_lowercase();
            workshops.retain(|w| {
                w.title.to_lowercase().contains(&term)
                    || w.description.to_lowercase().contains(&term)
                    || w.instructor.to_lowercase().contains(&term)
                    || w.tags.iter().any(|t| t.to_lowercase().contains(&term))
            });
        }

        if let Some(ref tag) = filter.tag {
            workshops.retain(|w| w.tags.iter().any(|t| t == tag));
        }

        Ok(workshops)
    }

    /// Distinct tags across the catalog, sorted.
    pub fn tags(&self) -> Result<Vec<String>> {
        let mut tags: Vec<String> = self
            .store
            .list_workshops(None)?
            .into_iter()
            .flat_map(|w| w.tags)
            .collect();
        tags.sort();
        tags.dedup();
        Ok(tags)
    }

    /// Catalog aggregates.
    pub fn stats(&self) -> Result<Stats> {
        let workshops = self.store.list_workshops(None)?;
        let count = |status: Status| workshops.iter().filter(|w| w.status == status).count();

        Ok(Stats {
            total: workshops.len(),
            upcoming: count(Status::Upcoming),
            live: count(Status::Live),
            completed: count(Status::Completed),
            total_capacity: workshops.iter().map(|w| u64::from(w.capacity.total)).sum(),
            total_enrolled: workshops.iter().map(|w| u64::from(w.capacity.filled)).sum(),
        })
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register a user for a workshop.
    ///
    /// The existence, status, capacity, and duplicate checks and the seat
    /// increment run in one transaction, so interleaved callers can never
    /// push `filled` past `total`.
    pub fn register(
        &mut self,
        id: WorkshopId,
        new: NewRegistration,
    ) -> Result<(Workshop, Registration)> {
        let now = Utc::now();

        let result = self.store.with_transaction(|ctx| {
            let workshop = ctx.get_workshop(id)?;

            if workshop.status.is_terminal() {
                return Err(Error::InvalidState {
                    id,
                    status: workshop.status,
                });
            }
            if workshop.capacity.is_full() {
                return Err(Error::Full(id));
            }
            if ctx.find_registration(id, &new.user_id)?.is_some() {
                return Err(Error::Duplicate {
                    workshop_id: id,
                    user_id: new.user_id.clone(),
                });
            }

            let registration = ctx.insert_registration(id, &new, now)?;
            let filled = workshop.capacity.filled + 1;
            ctx.set_filled(id, filled, now)?;

            let event = ctx.record_event(EventKind::Registered {
                workshop_id: id,
                user_id: new.user_id.clone(),
                filled,
            })?;
            ctx.insert_notification(
                &new.user_id,
                "registration",
                &format!("Successfully registered for {}", workshop.title),
                Some(id),
                now,
            )?;

            let workshop = ctx.get_workshop(id)?;
            Ok((workshop, registration, event))
        });

        match result {
            Ok((workshop, registration, event)) => {
                metrics::registrations().add(1, &[KeyValue::new("result", "ok")]);
                info!(workshop = %id, user = %registration.user_id, "registration confirmed");
                self.bus.publish(event);
                Ok((workshop, registration))
            }
            Err(err) => {
                metrics::registrations().add(1, &[KeyValue::new("result", rejection_label(&err))]);
                Err(err)
            }
        }
    }

    /// Cancel a user's registration. Frees the seat, floor zero.
    pub fn cancel(&mut self, id: WorkshopId, user_id: &str) -> Result<Workshop> {
        let now = Utc::now();

        let (workshop, event) = self.store.with_transaction(|ctx| {
            let registration = ctx.find_registration(id, user_id)?.ok_or_else(|| {
                Error::NotFound(format!("registration for user {user_id} in workshop {id}"))
            })?;
            let workshop = ctx.get_workshop(id)?;

            let filled = workshop.capacity.filled.saturating_sub(1);
            ctx.delete_registration(registration.id)?;
            ctx.set_filled(id, filled, now)?;

            let event = ctx.record_event(EventKind::Cancelled {
                workshop_id: id,
                user_id: user_id.to_string(),
                filled,
            })?;
            ctx.insert_notification(
                user_id,
                "cancellation",
                &format!("Registration cancelled for {}", workshop.title),
                Some(id),
                now,
            )?;

            let workshop = ctx.get_workshop(id)?;
            Ok((workshop, event))
        })?;

        metrics::cancellations().add(1, &[]);
        info!(workshop = %id, user = user_id, "registration cancelled");
        self.bus.publish(event);
        Ok(workshop)
    }

    /// Workshops a user is registered for, with their registrations.
    pub fn workshops_for_user(&self, user_id: &str) -> Result<Vec<(Workshop, Registration)>> {
        let mut result = Vec::new();
        for registration in self.store.registrations_for_user(user_id)? {
            let workshop = self.store.get_workshop(registration.workshop_id)?;
            result.push((workshop, registration));
        }
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    /// A user's notifications, newest first.
    pub fn notifications_for_user(&self, user_id: &str) -> Result<Vec<Notification>> {
        self.store.notifications_for_user(user_id)
    }

    pub fn mark_notification_read(&mut self, id: i64) -> Result<()> {
        self.store.mark_notification_read(id)
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Get events since a sequence number.
    pub fn events_since(&self, since_seq: u64) -> Result<Vec<Event>> {
        self.store.events_since(since_seq)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Recompute status for every non-completed workshop against `now`.
    ///
    /// Returns the transition events applied this sweep. Per-workshop
    /// evaluation errors are logged and skipped so one bad record cannot
    /// stall the rest of the sweep.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let span = lifecycle::tick_span();
        let _enter = span.enter();

        let workshops = self.store.list_workshops(None)?;
        let mut events = Vec::new();

        for workshop in &workshops {
            if workshop.status.is_terminal() {
                continue;
            }
            match self.advance(workshop, now) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => error!(workshop = %workshop.id, "lifecycle evaluation failed: {e}"),
            }
        }

        span.record("tick.transitions", events.len() as u64);
        for event in &events {
            self.bus.publish(event.clone());
        }
        Ok(events)
    }

    /// Apply at most one forward transition to a single workshop.
    fn advance(&mut self, workshop: &Workshop, now: DateTime<Utc>) -> Result<Option<Event>> {
        let target = Status::for_schedule(workshop.scheduled_start, workshop.duration_minutes, now);
        if target == workshop.status || !workshop.status.can_transition_to(target) {
            // already there, or the clock moved backwards: leave it alone
            return Ok(None);
        }

        let from = workshop.status;
        let event = self.store.with_transaction(|ctx| {
            ctx.update_status(workshop.id, target, now)?;
            let kind = match target {
                Status::Live => EventKind::WentLive { id: workshop.id },
                Status::Completed => EventKind::Completed { id: workshop.id },
                Status::Upcoming => {
                    return Err(Error::InvalidTransition { from, to: target });
                }
            };
            ctx.record_event(kind)
        })?;

        metrics::status_transitions().add(
            1,
            &[
                KeyValue::new("from", from.to_string()),
                KeyValue::new("to", target.to_string()),
            ],
        );
        lifecycle::record_transition(workshop.id, from, target);
        Ok(Some(event))
    }
}

fn rejection_label(err: &Error) -> &'static str {
    match err {
        Error::NotFound(_) => "not_found",
        Error::InvalidState { .. } => "closed",
        Error::Full(_) => "full",
        Error::Duplicate { .. } => "duplicate",
        _ => "error",
    }
}
