// --- File: crates/carebook_availability/src/sweep.rs ---
use crate::expander::FreeRange;
use carebook_common::models::{AvailableRange, AvailableTherapist, TherapistId};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tracing::debug;

// End sorts before Start so a range ending at t and one starting at t never
// show the first therapist as still active at t.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EventKind {
    End,
    Start,
}

#[derive(Debug)]
struct Event<'a> {
    at: DateTime<Utc>,
    kind: EventKind,
    range: &'a FreeRange,
}

/// Merges free ranges of many therapists into ordered, disjoint available ranges.
///
/// Sweep line over start/end events. Every time the clock advances while at least
/// one therapist is active, `[previous, current)` is emitted with the active
/// therapists sorted by display name, provided it lasts at least `min_bookable`.
/// Shorter fragments are dropped, not merged into a neighbour.
///
/// The active set is keyed by therapist id; a therapist appearing in two
/// overlapping ranges keeps the last one started.
pub fn merge_availability(free_ranges: &[FreeRange], min_bookable: Duration) -> Vec<AvailableRange> {
    let mut events: Vec<Event<'_>> = Vec::with_capacity(free_ranges.len() * 2);
    for range in free_ranges.iter().filter(|r| r.start < r.end) {
        events.push(Event {
            at: range.start,
            kind: EventKind::Start,
            range,
        });
        events.push(Event {
            at: range.end,
            kind: EventKind::End,
            range,
        });
    }
    events.sort_by(|a, b| a.at.cmp(&b.at).then(a.kind.cmp(&b.kind)));

    let mut active: BTreeMap<TherapistId, &FreeRange> = BTreeMap::new();
    let mut previous: Option<DateTime<Utc>> = None;
    let mut merged = Vec::new();

    for event in &events {
        if let Some(prev) = previous {
            if event.at > prev && !active.is_empty() {
                if event.at - prev >= min_bookable {
                    merged.push(AvailableRange {
                        start: prev,
                        end: event.at,
                        therapists: snapshot(&active),
                    });
                } else {
                    debug!(
                        "Dropping {} - {}: shorter than {} minutes",
                        prev,
                        event.at,
                        min_bookable.num_minutes()
                    );
                }
            }
        }

        match event.kind {
            EventKind::Start => {
                active.insert(event.range.therapist_id, event.range);
            }
            EventKind::End => {
                active.remove(&event.range.therapist_id);
            }
        }
        previous = Some(event.at);
    }

    debug!(
        "Merged {} free range(s) into {} available range(s)",
        free_ranges.len(),
        merged.len()
    );
    merged
}

fn snapshot(active: &BTreeMap<TherapistId, &FreeRange>) -> Vec<AvailableTherapist> {
    let mut therapists: Vec<AvailableTherapist> = active
        .values()
        .map(|r| AvailableTherapist {
            therapist_id: r.therapist_id,
            display_name: r.display_name.clone(),
            slot_id: r.slot_id,
        })
        .collect();
    therapists.sort_by(|a, b| {
        a.display_name
            .cmp(&b.display_name)
            .then(a.therapist_id.cmp(&b.therapist_id))
    });
    therapists
}
