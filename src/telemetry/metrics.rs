//! Metric instrument factories for workshopd.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"workshopd"` meter.

use opentelemetry::metrics::{Counter, Meter};

/// Returns the shared meter for workshopd instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("workshopd")
}

/// Counter: registration attempts.
/// Labels: `result` ("ok" | "not_found" | "closed" | "full" | "duplicate" | "error").
pub fn registrations() -> Counter<u64> {
    meter()
        .u64_counter("workshopd.registrations")
        .with_description("Number of registration attempts")
        .build()
}

/// Counter: cancelled registrations.
pub fn cancellations() -> Counter<u64> {
    meter()
        .u64_counter("workshopd.cancellations")
        .with_description("Number of cancelled registrations")
        .build()
}

/// Counter: workshop status transitions.
/// Labels: `from`, `to`.
pub fn status_transitions() -> Counter<u64> {
    meter()
        .u64_counter("workshopd.status_transitions")
        .with_description("Number of workshop status transitions")
        .build()
}

/// Counter: catalog reads over the HTTP API.
/// Labels: `endpoint` ("list" | "get").
pub fn workshop_views() -> Counter<u64> {
    meter()
        .u64_counter("workshopd.workshop_views")
        .with_description("Number of workshop catalog reads")
        .build()
}
