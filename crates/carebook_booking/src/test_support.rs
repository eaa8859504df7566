//! Fixtures shared by the engine unit tests.

use crate::engine::{BookingEngine, Repositories};
use async_trait::async_trait;
use carebook_common::models::{
    Appointment, AppointmentKind, AppointmentState, ConfirmationRequest, RecurringSlot,
    SessionRecord, StoredAppointment, Therapist, TherapistId,
};
use carebook_common::{BookingNotifier, BoxedError, FixedClock, SessionCreator};
use carebook_config::SchedulingConfig;
use carebook_db::InMemoryStore;
use chrono::{DateTime, NaiveTime, TimeZone, Utc, Weekday};
use mockall::mock;
use std::sync::Arc;
use uuid::Uuid;

mock! {
    pub Sessions {}

    #[async_trait]
    impl SessionCreator for Sessions {
        async fn create_session(
            &self,
            appointment: &Appointment,
            request: &ConfirmationRequest,
        ) -> Result<SessionRecord, BoxedError>;
    }
}

mock! {
    pub Notifier {}

    #[async_trait]
    impl BookingNotifier for Notifier {
        async fn appointment_confirmed(&self, appointment: &Appointment) -> Result<(), BoxedError>;

        async fn appointment_cancelled_by_conflict(
            &self,
            cancelled: &Appointment,
            confirmed: &Appointment,
        ) -> Result<(), BoxedError>;
    }
}

/// Thursday 1 May 2025, 08:00 UTC
pub(crate) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap()
}

/// Monday 5 May 2025 at the given UTC time
pub(crate) fn monday_at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 5, hour, minute, 0).unwrap()
}

pub(crate) fn therapist(name: &str) -> Therapist {
    Therapist {
        id: Uuid::new_v4(),
        display_name: name.to_string(),
        specializations: vec!["anxiety".to_string()],
        languages: vec!["en".to_string()],
    }
}

pub(crate) fn slot(therapist_id: TherapistId, weekday: Weekday, hour: u32, minutes: i64) -> RecurringSlot {
    RecurringSlot {
        id: Uuid::new_v4(),
        therapist_id,
        weekday,
        start_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
        duration_minutes: minutes,
        advance_notice_minutes: 0,
        post_session_break_minutes: 0,
        active: true,
    }
}

pub(crate) fn stored(
    therapist_id: TherapistId,
    kind: AppointmentKind,
    start: DateTime<Utc>,
    duration_minutes: i64,
    state: AppointmentState,
) -> StoredAppointment {
    StoredAppointment {
        id: Uuid::new_v4(),
        therapist_id,
        client_id: Uuid::new_v4(),
        kind,
        start,
        duration_minutes: Some(duration_minutes),
        client_timezone: None,
        state,
    }
}

/// An in-memory engine at [`now`] with one therapist, Ada, who works Mondays
/// 09:00-12:00, and one registered client.
pub(crate) struct Fixture {
    pub store: InMemoryStore,
    pub engine: BookingEngine,
    pub ada: Therapist,
    pub monday: RecurringSlot,
    pub client_id: Uuid,
}

impl Fixture {
    pub(crate) async fn new() -> Self {
        let store = InMemoryStore::new(60);
        let ada = therapist("Ada");
        let monday = slot(ada.id, Weekday::Mon, 9, 180);
        let client_id = Uuid::new_v4();
        store.add_therapist(ada.clone()).await;
        store.add_slot(monday.clone()).await;
        store.add_client(client_id).await;

        let engine = BookingEngine::new(Repositories::in_memory(&store), SchedulingConfig::default())
            .expect("default scheduling is valid")
            .with_clock(Arc::new(FixedClock(now())));

        Self {
            store,
            engine,
            ada,
            monday,
            client_id,
        }
    }

    /// Stores an appointment of Ada's and returns it as the engine will read it.
    pub(crate) async fn seed(
        &self,
        kind: AppointmentKind,
        start: DateTime<Utc>,
        duration_minutes: i64,
        state: AppointmentState,
    ) -> Appointment {
        let appointment = stored(self.ada.id, kind, start, duration_minutes, state);
        self.store.insert_appointment(appointment.clone()).await;
        appointment.resolve(60)
    }

    pub(crate) fn regular(&self) -> AppointmentKind {
        AppointmentKind::Regular {
            slot_id: self.monday.id,
        }
    }
}

pub(crate) fn confirmation(appointment_id: Uuid) -> ConfirmationRequest {
    ConfirmationRequest {
        appointment_id,
        payment_reference: Some("pay-123".to_string()),
        session_metadata: serde_json::json!({ "room": "video" }),
    }
}
