//! Core data model.
//!
//! A workshop is a schedulable training session with a fixed start time,
//! a duration, and a seat count. Its status advances with the clock and
//! never moves backward; seats are claimed and released by registrations.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Workshop
// ---------------------------------------------------------------------------

/// A workshop tracked by the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workshop {
    /// Unique identifier, assigned by the store. Immutable.
    pub id: WorkshopId,

    pub title: String,
    pub description: String,

    /// Who runs the session.
    pub instructor: String,

    /// Delivery mode.
    pub mode: Mode,

    /// Topic tags, used for catalog filtering.
    pub tags: Vec<String>,

    /// When the session starts.
    pub scheduled_start: DateTime<Utc>,

    /// Session length. The live window is
    /// [`scheduled_start`, `scheduled_start` + duration], inclusive on both ends.
    pub duration_minutes: u32,

    /// Current lifecycle status. Advances upcoming → live → completed,
    /// mutated only by the lifecycle sweep.
    pub status: Status,

    /// Seat counters. Mutated only by register/cancel.
    pub capacity: Capacity,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workshop {
    /// The instant the live window closes.
    pub fn end_time(&self) -> DateTime<Utc> {
        self.scheduled_start + Duration::minutes(i64::from(self.duration_minutes))
    }
}

/// Newtype for workshop IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkshopId(pub i64);

impl std::fmt::Display for WorkshopId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a workshop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Scheduled, live window not yet reached.
    Upcoming,
    /// Inside the live window.
    Live,
    /// Live window has passed. Terminal.
    Completed,
}

impl Status {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: Status) -> bool {
        use Status::*;
        matches!(
            (self, to),
            (Upcoming, Live)
                | (Upcoming, Completed) // whole live window fell inside one sweep gap
                | (Live, Completed)
        )
    }

    /// Is this a terminal status?
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed)
    }

    /// The status a schedule implies at `now`, ignoring history.
    ///
    /// The sweep only applies the result when it is a legal forward
    /// transition, so a completed workshop never reverts under clock skew.
    pub fn for_schedule(start: DateTime<Utc>, duration_minutes: u32, now: DateTime<Utc>) -> Status {
        if now < start {
            Status::Upcoming
        } else if now <= start + Duration::minutes(i64::from(duration_minutes)) {
            Status::Live
        } else {
            Status::Completed
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Upcoming => "upcoming",
            Status::Live => "live",
            Status::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Status {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s {
            "upcoming" => Ok(Status::Upcoming),
            "live" => Ok(Status::Live),
            "completed" => Ok(Status::Completed),
            _ => Err(crate::error::Error::Other(format!("unknown status: {s}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// How a workshop is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Online,
    Offline,
    Hybrid,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Mode::Online => "online",
            Mode::Offline => "offline",
            Mode::Hybrid => "hybrid",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Mode {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s {
            "online" => Ok(Mode::Online),
            "offline" => Ok(Mode::Offline),
            "hybrid" => Ok(Mode::Hybrid),
            _ => Err(crate::error::Error::Other(format!("unknown mode: {s}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Capacity
// ---------------------------------------------------------------------------

/// Seat counters gating registration. Invariant: 0 ≤ filled ≤ total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capacity {
    pub total: u32,
    pub filled: u32,
}

impl Capacity {
    pub fn is_full(self) -> bool {
        self.filled >= self.total
    }

    pub fn remaining(self) -> u32 {
        self.total.saturating_sub(self.filled)
    }
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// A confirmed link between a user and a workshop.
///
/// Unique per (user_id, workshop_id). Removed on cancellation, never
/// mutated otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub id: RegistrationId,
    pub workshop_id: WorkshopId,
    pub user_id: String,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub status: RegistrationStatus,
    pub registered_at: DateTime<Utc>,
}

/// Newtype for registration IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistrationId(pub i64);

impl std::fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Confirmed,
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationStatus::Confirmed => write!(f, "confirmed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// An append-only per-user notification, written on register/cancel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: String,
    pub kind: String,
    pub message: String,
    pub workshop_id: Option<WorkshopId>,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Builder for creating workshops. The scheduler's public API for new entries.
pub struct NewWorkshop {
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) instructor: String,
    pub(crate) mode: Mode,
    pub(crate) tags: Vec<String>,
    pub(crate) scheduled_start: DateTime<Utc>,
    pub(crate) duration_minutes: u32,
    pub(crate) capacity_total: u32,
    pub(crate) capacity_filled: u32,
}

impl NewWorkshop {
    pub fn new(
        title: impl Into<String>,
        scheduled_start: DateTime<Utc>,
        duration_minutes: u32,
        capacity_total: u32,
    ) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            instructor: String::new(),
            mode: Mode::default(),
            tags: Vec::new(),
            scheduled_start,
            duration_minutes,
            capacity_total,
            capacity_filled: 0,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn instructor(mut self, instructor: impl Into<String>) -> Self {
        self.instructor = instructor.into();
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Pre-claimed seats, for seeded catalogs. Clamped to the total at insert.
    pub fn filled(mut self, filled: u32) -> Self {
        self.capacity_filled = filled;
        self
    }
}

/// Builder for enrollment requests.
pub struct NewRegistration {
    pub(crate) user_id: String,
    pub(crate) user_email: Option<String>,
    pub(crate) user_name: Option<String>,
}

impl NewRegistration {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_email: None,
            user_name: None,
        }
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.user_email = Some(email.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }
}
