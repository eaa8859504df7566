#[cfg(test)]
mod tests {
    use crate::expander::{expand_therapist_availability, FreeRange};
    use crate::interval::overlaps;
    use crate::sweep::merge_availability;
    use carebook_common::models::{
        Appointment, AppointmentKind, AppointmentState, RecurringSlot, Therapist,
    };
    use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 5, 0, 0, 0).unwrap()
    }

    // Helper function to build non-overlapping free ranges per therapist from
    // (gap, length) pairs in minutes
    fn build_free_ranges(layout: &[Vec<(i64, i64)>]) -> Vec<FreeRange> {
        let mut ranges = Vec::new();
        for (index, pieces) in layout.iter().enumerate() {
            let therapist_id = Uuid::from_u128(index as u128 + 1);
            let mut cursor = base();
            for (gap, length) in pieces {
                let start = cursor + Duration::minutes(*gap);
                let end = start + Duration::minutes(*length);
                ranges.push(FreeRange {
                    therapist_id,
                    display_name: format!("Therapist {index}"),
                    slot_id: Uuid::new_v4(),
                    start,
                    end,
                });
                cursor = end;
            }
        }
        ranges
    }

    fn layout_strategy() -> impl Strategy<Value = Vec<Vec<(i64, i64)>>> {
        prop::collection::vec(
            prop::collection::vec((0..240i64, 1..240i64), 0..6),
            0..6,
        )
    }

    proptest! {
        #[test]
        fn test_overlaps_is_symmetric(
            a in 0..1000i64, a_len in 0..200i64,
            b in 0..1000i64, b_len in 0..200i64,
        ) {
            let (a_start, a_end) = (base() + Duration::minutes(a), base() + Duration::minutes(a + a_len));
            let (b_start, b_end) = (base() + Duration::minutes(b), base() + Duration::minutes(b + b_len));
            prop_assert_eq!(
                overlaps(a_start, a_end, b_start, b_end),
                overlaps(b_start, b_end, a_start, a_end)
            );
            // Adjacent intervals never overlap
            prop_assert!(!overlaps(a_start, a_end, a_end, a_end + Duration::minutes(b_len)));
        }

        #[test]
        fn test_merged_ranges_are_ordered_disjoint_and_above_floor(
            layout in layout_strategy(),
            floor in 1..60i64,
        ) {
            let free = build_free_ranges(&layout);
            let merged = merge_availability(&free, Duration::minutes(floor));

            for range in &merged {
                prop_assert!(range.end - range.start >= Duration::minutes(floor));
                prop_assert!(!range.therapists.is_empty());
            }
            for pair in merged.windows(2) {
                prop_assert!(pair[0].end <= pair[1].start, "ranges overlap: {:?}", pair);
            }
        }

        #[test]
        fn test_merged_ranges_stay_within_listed_therapists_input(
            layout in layout_strategy(),
            floor in 1..60i64,
        ) {
            let free = build_free_ranges(&layout);
            let merged = merge_availability(&free, Duration::minutes(floor));

            for range in &merged {
                for listed in &range.therapists {
                    let covered = free.iter().any(|f| {
                        f.therapist_id == listed.therapist_id
                            && f.slot_id == listed.slot_id
                            && f.start <= range.start
                            && range.end <= f.end
                    });
                    prop_assert!(covered, "{:?} not covered by input for {:?}", range, listed);
                }
            }
        }

        #[test]
        fn test_expansion_is_idempotent(
            slot_hour in 0..20u32,
            slot_minutes in 30..240i64,
            break_minutes in 0..30i64,
            bookings in prop::collection::vec((0..240i64, 10..90i64), 0..4),
        ) {
            let therapist = Therapist {
                id: Uuid::new_v4(),
                display_name: "Ada".to_string(),
                specializations: vec![],
                languages: vec![],
            };
            let slot = RecurringSlot {
                id: Uuid::new_v4(),
                therapist_id: therapist.id,
                weekday: Weekday::Mon,
                start_time: NaiveTime::from_hms_opt(slot_hour, 0, 0).unwrap(),
                duration_minutes: slot_minutes,
                advance_notice_minutes: 0,
                post_session_break_minutes: break_minutes,
                active: true,
            };
            let slot_start = base() + Duration::hours(slot_hour as i64);
            let appointments: Vec<Appointment> = bookings
                .iter()
                .map(|(offset, length)| Appointment {
                    id: Uuid::new_v4(),
                    therapist_id: therapist.id,
                    client_id: Uuid::new_v4(),
                    kind: AppointmentKind::Regular { slot_id: slot.id },
                    start: slot_start + Duration::minutes(*offset),
                    duration_minutes: *length,
                    client_timezone: None,
                    state: AppointmentState::Confirmed,
                })
                .collect();
            let monday = NaiveDate::from_ymd_opt(2025, 5, 5).unwrap();
            let now = base() - Duration::days(1);

            let first = expand_therapist_availability(
                &therapist, &[slot.clone()], &appointments, monday, monday, now, Duration::minutes(15),
            );
            let second = expand_therapist_availability(
                &therapist, &[slot], &appointments, monday, monday, now, Duration::minutes(15),
            );
            prop_assert_eq!(&first, &second);

            // Free ranges never intersect a confirmed appointment
            for range in &first {
                for appointment in &appointments {
                    prop_assert!(!overlaps(range.start, range.end, appointment.start, appointment.end()));
                }
            }
        }
    }
}
