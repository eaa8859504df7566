// --- File: crates/carebook_availability/src/lib.rs ---
//! Availability computation for Carebook.
//!
//! Pure functions, no I/O:
//!
//! - [`interval::overlaps`]: the half-open overlap test everything else builds on
//! - [`expander::expand_therapist_availability`]: one therapist's recurring slots
//!   minus their confirmed appointments, per day
//! - [`sweep::merge_availability`]: many therapists' free ranges merged into disjoint
//!   [`AvailableRange`](carebook_common::models::AvailableRange)s
//!
//! All arithmetic is in UTC.

pub mod expander;
pub mod interval;
#[cfg(test)]
mod availability_proptest;
pub mod sweep;

pub use expander::{expand_therapist_availability, FreeRange};
pub use interval::{overlaps, TimeRange};
pub use sweep::merge_availability;
