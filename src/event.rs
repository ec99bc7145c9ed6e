//! Structured events emitted on every state change.
//!
//! Events are appended to the store's log (monotonic `seq`, so consumers can
//! detect gaps) and fanned out over a broadcast channel for real-time
//! subscribers. The fan-out is fire-and-forget: slow or absent subscribers
//! simply miss messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::{Status, WorkshopId};

/// A structured event emitted by the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence number.
    pub seq: u64,
    /// When this event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub kind: EventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    WorkshopCreated {
        id: WorkshopId,
        title: String,
    },
    WentLive {
        id: WorkshopId,
    },
    Completed {
        id: WorkshopId,
    },
    Registered {
        workshop_id: WorkshopId,
        user_id: String,
        filled: u32,
    },
    Cancelled {
        workshop_id: WorkshopId,
        user_id: String,
        filled: u32,
    },
    /// Stored kind that this build doesn't recognize. Preserved raw.
    Unknown {
        raw: String,
    },
}

impl EventKind {
    /// The status a lifecycle event lands on, if it is one.
    pub fn status(&self) -> Option<Status> {
        match self {
            EventKind::WentLive { .. } => Some(Status::Live),
            EventKind::Completed { .. } => Some(Status::Completed),
            _ => None,
        }
    }
}

/// Fire-and-forget event fan-out.
///
/// Cheap to clone; all clones publish into the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. No delivery guarantee: errors (no subscribers)
    /// are ignored, lagging subscribers drop the oldest messages.
    pub fn publish(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
