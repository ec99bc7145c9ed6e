//! Lifecycle sweep span helpers.

use tracing::Span;

use crate::model::{Status, WorkshopId};

/// Start a span for one lifecycle sweep.
///
/// The `tick.transitions` field is declared empty and recorded once the
/// sweep knows how many transitions it applied.
pub fn tick_span() -> Span {
    tracing::info_span!("lifecycle.tick", "tick.transitions" = tracing::field::Empty)
}

/// Record a status transition inside the current sweep span.
pub fn record_transition(id: WorkshopId, from: Status, to: Status) {
    tracing::info!(workshop = %id, %from, %to, "status_transition");
}
