// --- File: crates/carebook_availability/src/interval.rs ---
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Do the half-open intervals `[a_start, a_end)` and `[b_start, b_end)` intersect?
///
/// Back-to-back intervals (`a_end == b_start`) do not overlap, which is what allows
/// zero-gap scheduling. Symmetric in its two intervals.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// A half-open UTC interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        debug_assert!(start <= end, "TimeRange start must not be after end");
        Self { start, end }
    }

    /// `[start, start + duration)`, or `None` when the end is past the last
    /// representable instant.
    pub fn starting_at(start: DateTime<Utc>, duration: Duration) -> Option<Self> {
        start
            .checked_add_signed(duration)
            .map(|end| Self::new(start, end))
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        overlaps(self.start, self.end, other.start, other.end)
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}
