// --- File: crates/carebook_availability/src/expander.rs ---
use crate::interval::{overlaps, TimeRange};
use carebook_common::models::{
    Appointment, AppointmentState, RecurringSlot, SlotId, Therapist, TherapistId,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::debug;

/// A free sub-range of one therapist's recurring slot on a concrete date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FreeRange {
    pub therapist_id: TherapistId,
    pub display_name: String,
    pub slot_id: SlotId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FreeRange {
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }
}

/// Expands a therapist's recurring slots into free ranges for every day of
/// `[start_date, end_date]`.
///
/// Per day and matching slot: the slot is skipped once `now` has passed its
/// booking cutoff (`slot start - advance notice`) or its end. Confirmed appointments
/// overlapping the slot are widened by the slot's post-session break, clipped to the
/// slot, and the remaining gaps are emitted. Gaps shorter than `min_bookable` are
/// dropped; a gap of exactly `min_bookable` is kept.
///
/// Inactive slots, slots of other therapists and non-confirmed appointments are ignored.
pub fn expand_therapist_availability(
    therapist: &Therapist,
    slots: &[RecurringSlot],
    appointments: &[Appointment],
    start_date: NaiveDate,
    end_date: NaiveDate,
    now: DateTime<Utc>,
    min_bookable: Duration,
) -> Vec<FreeRange> {
    let mut own_slots: Vec<&RecurringSlot> = slots
        .iter()
        .filter(|s| s.active && s.therapist_id == therapist.id)
        .collect();
    own_slots.sort_by_key(|s| (s.start_time, s.id));

    let booked: Vec<TimeRange> = appointments
        .iter()
        .filter(|a| a.therapist_id == therapist.id && a.state == AppointmentState::Confirmed)
        .map(|a| TimeRange::new(a.start, a.end()))
        .collect();

    debug!(
        "Expanding {} slot(s) and {} confirmed appointment(s) for therapist {} over {} - {}",
        own_slots.len(),
        booked.len(),
        therapist.id,
        start_date,
        end_date
    );

    let mut free = Vec::new();
    for date in start_date.iter_days().take_while(|d| *d <= end_date) {
        for slot in own_slots.iter().filter(|s| s.weekday == date.weekday()) {
            let (slot_start, slot_end) = slot.materialize(date);

            let past_cutoff = slot_start
                .checked_sub_signed(slot.advance_notice())
                .map_or(false, |cutoff| now > cutoff);
            if past_cutoff {
                debug!("Slot {} on {} is past its booking cutoff", slot.id, date);
                continue;
            }
            if slot_end <= now {
                continue;
            }

            for gap in slot_gaps(slot_start, slot_end, slot.post_session_break(), &booked) {
                if gap.duration() < min_bookable {
                    continue;
                }
                free.push(FreeRange {
                    therapist_id: therapist.id,
                    display_name: therapist.display_name.clone(),
                    slot_id: slot.id,
                    start: gap.start,
                    end: gap.end,
                });
            }
        }
    }
    free
}

/// The gaps left in `[slot_start, slot_end)` by the booked ranges, each extended by
/// `post_session_break` and clipped to the slot.
fn slot_gaps(
    slot_start: DateTime<Utc>,
    slot_end: DateTime<Utc>,
    post_session_break: Duration,
    booked: &[TimeRange],
) -> Vec<TimeRange> {
    let mut in_slot: Vec<&TimeRange> = booked
        .iter()
        .filter(|b| overlaps(b.start, b.end, slot_start, slot_end))
        .collect();
    in_slot.sort();

    let mut gaps = Vec::new();
    let mut cursor = slot_start;
    for booking in in_slot {
        let blocked_start = booking.start.max(slot_start);
        let blocked_end = booking
            .end
            .checked_add_signed(post_session_break)
            .map_or(slot_end, |end| end.min(slot_end));
        if blocked_start > cursor {
            gaps.push(TimeRange::new(cursor, blocked_start));
        }
        cursor = cursor.max(blocked_end);
    }
    if cursor < slot_end {
        gaps.push(TimeRange::new(cursor, slot_end));
    }
    gaps
}
