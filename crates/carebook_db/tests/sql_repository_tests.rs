use carebook_common::models::{AppointmentKind, AppointmentState, KindFilter, NewAppointment};
use carebook_db::{
    AppointmentRepository, ClientDirectory, DbError, SlotRepository, TherapistDirectory,
};
use chrono::{Duration, NaiveTime};
use fixtures::{
    create_test_appointment, create_test_slot, create_test_storage, create_test_therapist,
    monday_at,
};
use uuid::Uuid;


const OPEN: [AppointmentState; 2] = [AppointmentState::Pending, AppointmentState::Confirmed];

#[tokio::test]
async fn test_directory_filters_by_specialization_and_language() {
    let test = create_test_storage().await;
    let directory = &test.storage.directory;

    let grace = create_test_therapist("Grace", &["anxiety", "trauma"], &["en", "de"]);
    let ada = create_test_therapist("Ada", &["anxiety"], &["en"]);
    let linus = create_test_therapist("Linus", &["anxiety"], &["fi"]);
    for therapist in [&grace, &ada, &linus] {
        directory.add_therapist(therapist).await.unwrap();
    }

    let found = directory.find_by_specialization("anxiety", "en").await.unwrap();
    let names: Vec<_> = found.iter().map(|t| t.display_name.as_str()).collect();
    assert_eq!(names, vec!["Ada", "Grace"]);
    assert_eq!(found[1].specializations, vec!["anxiety", "trauma"]);
    assert_eq!(found[1].languages, vec!["de", "en"]);

    assert!(directory
        .find_by_specialization("trauma", "fi")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_directory_lookups_by_id() {
    let test = create_test_storage().await;
    let directory = &test.storage.directory;

    let ada = create_test_therapist("Ada", &["anxiety"], &["en"]);
    directory.add_therapist(&ada).await.unwrap();
    let client_id = Uuid::new_v4();
    directory.add_client(client_id, "Client").await.unwrap();

    let found = directory.find_by_ids(&[Uuid::new_v4(), ada.id]).await.unwrap();
    assert_eq!(found, vec![ada]);
    assert!(directory.find_by_ids(&[]).await.unwrap().is_empty());

    assert!(directory.client_exists(client_id).await.unwrap());
    assert!(!directory.client_exists(Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
async fn test_slots_skip_inactive_and_invalid_rows() {
    let test = create_test_storage().await;
    let slots = &test.storage.slots;
    let therapist_id = Uuid::new_v4();

    let mut active = create_test_slot(therapist_id, 9, 90);
    active.start_time = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
    active.advance_notice_minutes = 120;
    active.post_session_break_minutes = 10;
    let mut inactive = create_test_slot(therapist_id, 13, 60);
    inactive.active = false;
    slots.add_slot(&active).await.unwrap();
    slots.add_slot(&inactive).await.unwrap();

    // Rows written by other tools may be out of range
    test.storage
        .db_client
        .execute(&format!(
            "INSERT INTO recurring_slots (id, therapist_id, weekday, start_minute, duration_minutes) \
             VALUES ('{}', '{}', 0, 600, 0)",
            Uuid::new_v4(),
            therapist_id
        ))
        .await
        .unwrap();

    let found = slots.active_slots_for_therapists(&[therapist_id]).await.unwrap();
    assert_eq!(found, vec![active.clone()]);

    assert_eq!(slots.find_slot(inactive.id).await.unwrap(), Some(inactive));
    assert_eq!(slots.find_slot(Uuid::new_v4()).await.unwrap(), None);
}

#[tokio::test]
async fn test_invalid_slot_is_refused() {
    let test = create_test_storage().await;
    let slot = create_test_slot(Uuid::new_v4(), 9, 0);

    let err = test.storage.slots.add_slot(&slot).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidRecord(_)), "unexpected error: {err}");
}

#[tokio::test]
async fn test_created_appointment_is_pending_and_readable() {
    let test = create_test_storage().await;
    let appointments = &test.storage.appointments;
    let slot_id = Uuid::new_v4();

    let created = appointments
        .create_appointment(NewAppointment {
            therapist_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            kind: AppointmentKind::Regular { slot_id },
            start: monday_at(9, 0),
            duration_minutes: 50,
            client_timezone: Some("Europe/Berlin".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(created.state, AppointmentState::Pending);
    let found = appointments.find_appointment(created.id).await.unwrap();
    assert_eq!(found, Some(created));
}

#[tokio::test]
async fn test_adhoc_appointment_without_timezone_reads_back() {
    let test = create_test_storage().await;
    let appointments = &test.storage.appointments;
    let therapist_id = Uuid::new_v4();

    // No slot id and no timezone: both columns are stored as NULL
    let created = appointments
        .create_appointment(NewAppointment {
            therapist_id,
            client_id: Uuid::new_v4(),
            kind: AppointmentKind::AdHoc,
            start: monday_at(13, 0),
            duration_minutes: 45,
            client_timezone: None,
        })
        .await
        .unwrap();

    let found = appointments.find_appointment(created.id).await.unwrap();
    assert_eq!(found, Some(created.clone()));

    let in_range = appointments
        .appointments_in_range(&[therapist_id], monday_at(12, 0), monday_at(14, 0), &OPEN, KindFilter::AdHoc)
        .await
        .unwrap();
    assert_eq!(in_range, vec![created.clone()]);

    let mut tx = appointments.begin().await.unwrap();
    let overlapping = tx
        .find_overlapping(therapist_id, monday_at(13, 30), monday_at(14, 0), &OPEN, KindFilter::Any, None)
        .await
        .unwrap();
    tx.rollback().await.unwrap();
    assert_eq!(overlapping, vec![created]);
}

#[tokio::test]
async fn test_range_query_uses_default_duration_for_legacy_rows() {
    let test = create_test_storage().await;
    let appointments = &test.storage.appointments;
    let therapist_id = Uuid::new_v4();

    let legacy = create_test_appointment(
        therapist_id,
        AppointmentKind::AdHoc,
        monday_at(9, 0),
        None,
        AppointmentState::Confirmed,
    );
    appointments.insert_stored(&legacy).await.unwrap();

    let inside = appointments
        .appointments_in_range(&[therapist_id], monday_at(9, 30), monday_at(9, 45), &OPEN, KindFilter::Any)
        .await
        .unwrap();
    assert_eq!(inside.len(), 1);
    assert_eq!(inside[0].duration_minutes, 60);
    assert_eq!(inside[0].end(), monday_at(10, 0));

    // Touching the end is not an overlap
    let after = appointments
        .appointments_in_range(&[therapist_id], monday_at(10, 0), monday_at(11, 0), &OPEN, KindFilter::Any)
        .await
        .unwrap();
    assert!(after.is_empty());
}

#[tokio::test]
async fn test_range_query_filters_states_and_kinds() {
    let test = create_test_storage().await;
    let appointments = &test.storage.appointments;
    let therapist_id = Uuid::new_v4();

    let regular = create_test_appointment(
        therapist_id,
        AppointmentKind::Regular { slot_id: Uuid::new_v4() },
        monday_at(9, 0),
        Some(50),
        AppointmentState::Pending,
    );
    let adhoc = create_test_appointment(
        therapist_id,
        AppointmentKind::AdHoc,
        monday_at(11, 0),
        Some(50),
        AppointmentState::Confirmed,
    );
    let cancelled = create_test_appointment(
        therapist_id,
        AppointmentKind::AdHoc,
        monday_at(13, 0),
        Some(50),
        AppointmentState::Cancelled,
    );
    for appointment in [&regular, &adhoc, &cancelled] {
        appointments.insert_stored(appointment).await.unwrap();
    }
    let (from, to) = (monday_at(0, 0), monday_at(23, 0));

    let open = appointments
        .appointments_in_range(&[therapist_id], from, to, &OPEN, KindFilter::Any)
        .await
        .unwrap();
    let ids: Vec<_> = open.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![regular.id, adhoc.id], "ordered by start, cancelled excluded");

    let regular_only = appointments
        .appointments_in_range(&[therapist_id], from, to, &OPEN, KindFilter::Regular)
        .await
        .unwrap();
    assert_eq!(regular_only.len(), 1);
    assert_eq!(regular_only[0].kind.slot_id(), regular.kind.slot_id());

    let confirmed_adhoc = appointments
        .appointments_in_range(
            &[therapist_id],
            from,
            to,
            &[AppointmentState::Confirmed],
            KindFilter::AdHoc,
        )
        .await
        .unwrap();
    assert_eq!(confirmed_adhoc.len(), 1);
    assert_eq!(confirmed_adhoc[0].id, adhoc.id);
}

#[tokio::test]
async fn test_update_state_is_conditional() {
    let test = create_test_storage().await;
    let appointments = &test.storage.appointments;
    let appointment = create_test_appointment(
        Uuid::new_v4(),
        AppointmentKind::AdHoc,
        monday_at(9, 0),
        Some(50),
        AppointmentState::Pending,
    );
    appointments.insert_stored(&appointment).await.unwrap();

    assert!(appointments
        .update_state(appointment.id, AppointmentState::Pending, AppointmentState::Cancelled)
        .await
        .unwrap());
    assert!(!appointments
        .update_state(appointment.id, AppointmentState::Pending, AppointmentState::Confirmed)
        .await
        .unwrap());
    assert!(!appointments
        .update_state(Uuid::new_v4(), AppointmentState::Pending, AppointmentState::Cancelled)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_transaction_commit_and_rollback() {
    let test = create_test_storage().await;
    let appointments = &test.storage.appointments;
    let therapist_id = Uuid::new_v4();
    let target = create_test_appointment(
        therapist_id,
        AppointmentKind::AdHoc,
        monday_at(9, 0),
        Some(60),
        AppointmentState::Pending,
    );
    let rival = create_test_appointment(
        therapist_id,
        AppointmentKind::AdHoc,
        monday_at(9, 30),
        Some(60),
        AppointmentState::Pending,
    );
    appointments.insert_stored(&target).await.unwrap();
    appointments.insert_stored(&rival).await.unwrap();

    // Rolled back: nothing changes
    let mut tx = appointments.begin().await.unwrap();
    tx.lock_therapist(therapist_id).await.unwrap();
    assert_eq!(tx.cancel_pending(&[rival.id]).await.unwrap(), 1);
    tx.rollback().await.unwrap();
    let found = appointments.find_appointment(rival.id).await.unwrap().unwrap();
    assert_eq!(found.state, AppointmentState::Pending);

    // Committed: the rival is cancelled and the target confirmed
    let mut tx = appointments.begin().await.unwrap();
    tx.lock_therapist(therapist_id).await.unwrap();
    let overlapping = tx
        .find_overlapping(
            therapist_id,
            target.start,
            target.start + Duration::minutes(60),
            &OPEN,
            KindFilter::Any,
            Some(target.id),
        )
        .await
        .unwrap();
    assert_eq!(overlapping.iter().map(|a| a.id).collect::<Vec<_>>(), vec![rival.id]);
    assert_eq!(tx.cancel_pending(&[rival.id]).await.unwrap(), 1);
    assert!(tx
        .update_state(target.id, AppointmentState::Pending, AppointmentState::Confirmed)
        .await
        .unwrap());
    tx.commit().await.unwrap();

    let rival = appointments.find_appointment(rival.id).await.unwrap().unwrap();
    let target = appointments.find_appointment(target.id).await.unwrap().unwrap();
    assert_eq!(rival.state, AppointmentState::Cancelled);
    assert_eq!(target.state, AppointmentState::Confirmed);
}

#[tokio::test]
async fn test_unique_index_rejects_second_confirmed_start() {
    let test = create_test_storage().await;
    let appointments = &test.storage.appointments;
    let therapist_id = Uuid::new_v4();
    let first = create_test_appointment(
        therapist_id,
        AppointmentKind::AdHoc,
        monday_at(9, 0),
        Some(60),
        AppointmentState::Pending,
    );
    let second = create_test_appointment(
        therapist_id,
        AppointmentKind::AdHoc,
        monday_at(9, 0),
        Some(30),
        AppointmentState::Pending,
    );
    appointments.insert_stored(&first).await.unwrap();
    appointments.insert_stored(&second).await.unwrap();

    assert!(appointments
        .update_state(first.id, AppointmentState::Pending, AppointmentState::Confirmed)
        .await
        .unwrap());
    let err = appointments
        .update_state(second.id, AppointmentState::Pending, AppointmentState::Confirmed)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::UniqueViolation(_)), "unexpected error: {err}");
}
