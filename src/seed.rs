//! Demo catalog.
//!
//! Six workshops offset from `now` so every lifecycle and capacity path is
//! reachable out of the box: two already finished (one of them full), one
//! currently inside its live window, and three upcoming.

use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::model::{Mode, NewWorkshop};
use crate::scheduler::Scheduler;

pub fn demo_workshops(now: DateTime<Utc>) -> Vec<NewWorkshop> {
    vec![
        NewWorkshop::new("Rust Fundamentals", now + Duration::days(2), 180, 50)
            .description("Ownership, borrowing, and the type system from the ground up.")
            .instructor("Priya Sharma")
            .mode(Mode::Online)
            .tags(["rust", "beginner"])
            .filled(24),
        NewWorkshop::new("Distributed Systems Deep Dive", now - Duration::minutes(30), 120, 30)
            .description("Consensus, replication, and what actually breaks in production.")
            .instructor("Marco Ruiz")
            .mode(Mode::Hybrid)
            .tags(["distributed-systems", "advanced"])
            .filled(28),
        NewWorkshop::new("API Design Workshop", now + Duration::days(5), 240, 40)
            .description("Designing HTTP APIs people can actually live with.")
            .instructor("Janet Okafor")
            .mode(Mode::Online)
            .tags(["api", "backend"])
            .filled(12),
        NewWorkshop::new("Interface Design Basics", now - Duration::days(3), 150, 25)
            .description("Layout, hierarchy, and usability testing for engineers.")
            .instructor("Tomás Herrera")
            .mode(Mode::Offline)
            .tags(["design", "ux"])
            .filled(25),
        NewWorkshop::new("Data Pipelines in Practice", now + Duration::days(7), 300, 60)
            .description("Batch and streaming pipelines, from ingestion to serving.")
            .instructor("Wei Lin")
            .mode(Mode::Online)
            .tags(["data", "python"])
            .filled(45),
        NewWorkshop::new("Container Orchestration", now - Duration::days(1), 200, 35)
            .description("Scheduling, rollout strategies, and debugging cluster state.")
            .instructor("Sofia Bergström")
            .mode(Mode::Hybrid)
            .tags(["devops", "kubernetes"])
            .filled(31),
    ]
}

/// Load the demo catalog into a scheduler. Returns how many were added.
pub fn load(scheduler: &mut Scheduler, now: DateTime<Utc>) -> Result<usize> {
    let workshops = demo_workshops(now);
    let count = workshops.len();
    for new in workshops {
        scheduler.add_workshop(new)?;
    }
    Ok(count)
}
