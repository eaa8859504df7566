#[cfg(test)]
mod tests {
    use crate::test_support::{monday_at, slot, therapist, Fixture};
    use carebook_common::models::{
        AdHocBookingRequest, AppointmentKind, AppointmentState, BookingRequest, RecurringSlot,
        Therapist,
    };
    use carebook_common::{BookingError, ErrorKind, FixedClock};
    use chrono::{DateTime, Duration, Utc, Weekday};
    use std::sync::Arc;
    use uuid::Uuid;

    fn booking(fixture: &Fixture, start: DateTime<Utc>, duration_minutes: i64) -> BookingRequest {
        BookingRequest {
            therapist_id: fixture.ada.id,
            client_id: fixture.client_id,
            slot_id: fixture.monday.id,
            start,
            duration_minutes,
            client_timezone: Some("Europe/Zurich".to_string()),
        }
    }

    fn adhoc(fixture: &Fixture, start: DateTime<Utc>, duration_minutes: i64) -> AdHocBookingRequest {
        AdHocBookingRequest {
            therapist_id: fixture.ada.id,
            client_id: fixture.client_id,
            start,
            duration_minutes,
            client_timezone: None,
        }
    }

    // Adds a second therapist with a single slot built by `customize`.
    async fn add_grace(
        fixture: &Fixture,
        customize: impl FnOnce(&mut RecurringSlot),
    ) -> (Therapist, RecurringSlot) {
        let grace = therapist("Grace");
        let mut grace_slot = slot(grace.id, Weekday::Mon, 9, 180);
        customize(&mut grace_slot);
        fixture.store.add_therapist(grace.clone()).await;
        fixture.store.add_slot(grace_slot.clone()).await;
        (grace, grace_slot)
    }

    fn assert_unavailable(result: Result<impl std::fmt::Debug, BookingError>) {
        match result {
            Err(BookingError::SlotUnavailable(_)) => {}
            other => panic!("expected SlotUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_request_inside_free_slot_is_admitted_as_pending() {
        let fixture = Fixture::new().await;

        let appointment = fixture
            .engine
            .create_appointment(booking(&fixture, monday_at(10, 0), 50))
            .await
            .unwrap();

        assert_eq!(appointment.state, AppointmentState::Pending);
        assert_eq!(appointment.kind, fixture.regular());
        assert_eq!(appointment.client_timezone.as_deref(), Some("Europe/Zurich"));
        assert_eq!(
            fixture.engine.get_appointment(appointment.id).await.unwrap(),
            appointment
        );
    }

    #[tokio::test]
    async fn test_confirmed_appointment_blocks_admission() {
        let fixture = Fixture::new().await;
        fixture
            .seed(fixture.regular(), monday_at(10, 0), 60, AppointmentState::Confirmed)
            .await;

        assert_unavailable(
            fixture
                .engine
                .create_appointment(booking(&fixture, monday_at(10, 30), 60))
                .await,
        );
        // Back to back with the confirmed session is fine
        assert!(fixture
            .engine
            .create_appointment(booking(&fixture, monday_at(11, 0), 60))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_pending_appointments_do_not_block_admission() {
        let fixture = Fixture::new().await;
        fixture
            .seed(fixture.regular(), monday_at(10, 0), 60, AppointmentState::Pending)
            .await;

        assert!(fixture
            .engine
            .create_appointment(booking(&fixture, monday_at(10, 0), 60))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_request_must_fit_inside_the_slot() {
        let fixture = Fixture::new().await;

        assert_unavailable(
            fixture
                .engine
                .create_appointment(booking(&fixture, monday_at(11, 30), 60))
                .await,
        );
        assert_unavailable(
            fixture
                .engine
                .create_appointment(booking(&fixture, monday_at(8, 30), 60))
                .await,
        );
        // Wrong weekday
        assert_unavailable(
            fixture
                .engine
                .create_appointment(booking(&fixture, monday_at(10, 0) + Duration::days(1), 60))
                .await,
        );
    }

    #[tokio::test]
    async fn test_advance_notice_closes_the_slot() {
        let fixture = Fixture::new().await;
        let (grace, grace_slot) = add_grace(&fixture, |s| s.advance_notice_minutes = 120).await;
        let request = BookingRequest {
            therapist_id: grace.id,
            client_id: fixture.client_id,
            slot_id: grace_slot.id,
            start: monday_at(11, 0),
            duration_minutes: 60,
            client_timezone: None,
        };

        // Cutoff is 07:00
        let before_cutoff = fixture
            .engine
            .clone()
            .with_clock(Arc::new(FixedClock(monday_at(7, 0))));
        assert!(before_cutoff.create_appointment(request.clone()).await.is_ok());

        let after_cutoff = fixture
            .engine
            .clone()
            .with_clock(Arc::new(FixedClock(monday_at(7, 1))));
        assert_unavailable(after_cutoff.create_appointment(request).await);
    }

    #[tokio::test]
    async fn test_post_session_break_follows_confirmed_appointments() {
        let fixture = Fixture::new().await;
        let (grace, grace_slot) = add_grace(&fixture, |s| s.post_session_break_minutes = 15).await;
        fixture
            .store
            .insert_appointment(crate::test_support::stored(
                grace.id,
                AppointmentKind::Regular {
                    slot_id: grace_slot.id,
                },
                monday_at(9, 0),
                60,
                AppointmentState::Confirmed,
            ))
            .await;
        let request = |start| BookingRequest {
            therapist_id: grace.id,
            client_id: fixture.client_id,
            slot_id: grace_slot.id,
            start,
            duration_minutes: 30,
            client_timezone: None,
        };

        assert_unavailable(fixture.engine.create_appointment(request(monday_at(10, 0))).await);
        assert!(fixture
            .engine
            .create_appointment(request(monday_at(10, 15)))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_slot_crossing_midnight_admits_next_day_request() {
        let fixture = Fixture::new().await;
        let (grace, grace_slot) = add_grace(&fixture, |s| {
            s.weekday = Weekday::Sun;
            s.start_time = chrono::NaiveTime::from_hms_opt(23, 0, 0).unwrap();
            s.duration_minutes = 120;
        })
        .await;

        let appointment = fixture
            .engine
            .create_appointment(BookingRequest {
                therapist_id: grace.id,
                client_id: fixture.client_id,
                slot_id: grace_slot.id,
                start: monday_at(0, 0),
                duration_minutes: 45,
                client_timezone: None,
            })
            .await
            .unwrap();

        assert_eq!(appointment.start, monday_at(0, 0));
    }

    #[tokio::test]
    async fn test_unknown_references_are_not_found() {
        let fixture = Fixture::new().await;
        let (_, grace_slot) = add_grace(&fixture, |_| {}).await;

        let mut unknown_therapist = booking(&fixture, monday_at(10, 0), 60);
        unknown_therapist.therapist_id = Uuid::new_v4();
        let mut unknown_client = booking(&fixture, monday_at(10, 0), 60);
        unknown_client.client_id = Uuid::new_v4();
        let mut foreign_slot = booking(&fixture, monday_at(10, 0), 60);
        foreign_slot.slot_id = grace_slot.id;

        for request in [unknown_therapist, unknown_client, foreign_slot] {
            let err = fixture.engine.create_appointment(request).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound, "unexpected error: {err}");
        }
    }

    #[tokio::test]
    async fn test_malformed_requests_are_rejected_before_any_read() {
        let fixture = Fixture::new().await;

        let mut zero = booking(&fixture, monday_at(10, 0), 0);
        zero.therapist_id = Uuid::new_v4();
        let too_long = booking(&fixture, monday_at(10, 0), 24 * 60 + 1);
        let mut nil_client = booking(&fixture, monday_at(10, 0), 60);
        nil_client.client_id = Uuid::nil();
        let mut bad_zone = booking(&fixture, monday_at(10, 0), 60);
        bad_zone.client_timezone = Some("Europe/Atlantis".to_string());

        for request in [zero, too_long, nil_client, bad_zone] {
            let err = fixture.engine.create_appointment(request).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "unexpected error: {err}");
        }
    }

    #[tokio::test]
    async fn test_adhoc_outside_slots_is_admitted() {
        let fixture = Fixture::new().await;

        let appointment = fixture
            .engine
            .create_adhoc_appointment(adhoc(&fixture, monday_at(13, 0), 60))
            .await
            .unwrap();

        assert_eq!(appointment.kind, AppointmentKind::AdHoc);
        assert_eq!(appointment.state, AppointmentState::Pending);
    }

    #[tokio::test]
    async fn test_adhoc_may_touch_but_not_overlap_a_slot() {
        let fixture = Fixture::new().await;

        assert_unavailable(
            fixture
                .engine
                .create_adhoc_appointment(adhoc(&fixture, monday_at(11, 30), 60))
                .await,
        );
        assert!(fixture
            .engine
            .create_adhoc_appointment(adhoc(&fixture, monday_at(12, 0), 60))
            .await
            .is_ok());
        assert!(fixture
            .engine
            .create_adhoc_appointment(adhoc(&fixture, monday_at(8, 0), 60))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_adhoc_overlapping_open_appointments_is_rejected() {
        let fixture = Fixture::new().await;
        fixture
            .seed(AppointmentKind::AdHoc, monday_at(14, 0), 60, AppointmentState::Pending)
            .await;
        fixture
            .seed(AppointmentKind::AdHoc, monday_at(16, 0), 60, AppointmentState::Cancelled)
            .await;

        assert_unavailable(
            fixture
                .engine
                .create_adhoc_appointment(adhoc(&fixture, monday_at(14, 30), 60))
                .await,
        );
        // Cancelled appointments free their time
        assert!(fixture
            .engine
            .create_adhoc_appointment(adhoc(&fixture, monday_at(16, 0), 60))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_adhoc_checks_slot_from_the_previous_day() {
        let fixture = Fixture::new().await;
        let (grace, _) = add_grace(&fixture, |s| {
            s.weekday = Weekday::Sun;
            s.start_time = chrono::NaiveTime::from_hms_opt(23, 0, 0).unwrap();
            s.duration_minutes = 120;
        })
        .await;
        let mut request = adhoc(&fixture, monday_at(0, 30), 30);
        request.therapist_id = grace.id;

        assert_unavailable(fixture.engine.create_adhoc_appointment(request).await);
    }

    #[tokio::test]
    async fn test_adhoc_in_the_past_is_invalid() {
        let fixture = Fixture::new().await;

        let err = fixture
            .engine
            .create_adhoc_appointment(adhoc(
                &fixture,
                crate::test_support::now() - Duration::minutes(1),
                30,
            ))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_start_at_the_end_of_time_is_invalid() {
        let fixture = Fixture::new().await;
        let late = DateTime::<Utc>::MAX_UTC - Duration::minutes(10);
        let late_but_fits = DateTime::<Utc>::MAX_UTC - Duration::hours(2);

        for start in [late, late_but_fits] {
            let err = fixture
                .engine
                .create_appointment(booking(&fixture, start, 60))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "unexpected error: {err}");

            let err = fixture
                .engine
                .create_adhoc_appointment(adhoc(&fixture, start, 60))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "unexpected error: {err}");
        }
    }
}
