//! In-memory storage
//!
//! Implements every repository trait over one mutex-guarded state. A transaction
//! holds the mutex for its whole lifetime and works on a copy of the appointment
//! table, so transactions are fully serialized and rollback is simply dropping
//! the copy. Used by tests and by embedders that need no durable storage.

use crate::error::DbError;
use crate::repositories::{
    AppointmentRepository, AppointmentTransaction, ClientDirectory, SlotRepository,
    TherapistDirectory,
};
use async_trait::async_trait;
use carebook_common::models::{
    Appointment, AppointmentId, AppointmentState, ClientId, KindFilter, NewAppointment,
    RecurringSlot, SlotId, StoredAppointment, Therapist, TherapistId,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Default)]
struct MemoryState {
    therapists: HashMap<TherapistId, Therapist>,
    clients: HashSet<ClientId>,
    slots: HashMap<SlotId, RecurringSlot>,
    appointments: HashMap<AppointmentId, StoredAppointment>,
}

/// Storage held in process memory
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
    default_appointment_minutes: i64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(60)
    }
}

impl InMemoryStore {
    /// Create an empty store
    ///
    /// `default_appointment_minutes` is assumed for appointments stored without a duration.
    pub fn new(default_appointment_minutes: i64) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            default_appointment_minutes,
        }
    }

    pub async fn add_therapist(&self, therapist: Therapist) {
        self.state
            .lock()
            .await
            .therapists
            .insert(therapist.id, therapist);
    }

    pub async fn add_client(&self, client_id: ClientId) {
        self.state.lock().await.clients.insert(client_id);
    }

    pub async fn add_slot(&self, slot: RecurringSlot) {
        self.state.lock().await.slots.insert(slot.id, slot);
    }

    /// Store an appointment as-is, including a missing duration
    pub async fn insert_appointment(&self, appointment: StoredAppointment) {
        self.state
            .lock()
            .await
            .appointments
            .insert(appointment.id, appointment);
    }
}

fn sorted_therapists<'a>(therapists: impl Iterator<Item = &'a Therapist>) -> Vec<Therapist> {
    let mut found: Vec<Therapist> = therapists.cloned().collect();
    found.sort_by(|a, b| a.display_name.cmp(&b.display_name).then(a.id.cmp(&b.id)));
    found
}

#[allow(clippy::too_many_arguments)]
fn overlapping(
    appointments: &HashMap<AppointmentId, StoredAppointment>,
    therapist_ids: &[TherapistId],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    states: &[AppointmentState],
    kinds: KindFilter,
    exclude: Option<AppointmentId>,
    default_minutes: i64,
) -> Vec<Appointment> {
    let mut found: Vec<Appointment> = appointments
        .values()
        .filter(|a| therapist_ids.contains(&a.therapist_id))
        .filter(|a| states.contains(&a.state) && kinds.matches(&a.kind))
        .filter(|a| Some(a.id) != exclude)
        .cloned()
        .map(|a| a.resolve(default_minutes))
        .filter(|a| a.start < to && a.end() > from)
        .collect();
    found.sort_by(|a, b| a.start.cmp(&b.start).then(a.id.cmp(&b.id)));
    found
}

// Mirrors the unique index on confirmed (therapist_id, start_at).
fn confirmed_start_taken(
    appointments: &HashMap<AppointmentId, StoredAppointment>,
    candidate: &StoredAppointment,
) -> bool {
    appointments.values().any(|other| {
        other.id != candidate.id
            && other.state == AppointmentState::Confirmed
            && other.therapist_id == candidate.therapist_id
            && other.start == candidate.start
    })
}

fn update_state_in(
    appointments: &mut HashMap<AppointmentId, StoredAppointment>,
    id: AppointmentId,
    from: AppointmentState,
    to: AppointmentState,
) -> Result<bool, DbError> {
    let Some(current) = appointments.get(&id) else {
        return Ok(false);
    };
    if current.state != from {
        return Ok(false);
    }
    if to == AppointmentState::Confirmed && confirmed_start_taken(appointments, current) {
        return Err(DbError::UniqueViolation(format!(
            "therapist {} already has a confirmed appointment at {}",
            current.therapist_id, current.start
        )));
    }
    if let Some(appointment) = appointments.get_mut(&id) {
        appointment.state = to;
    }
    Ok(true)
}

#[async_trait]
impl SlotRepository for InMemoryStore {
    async fn active_slots_for_therapists(
        &self,
        therapist_ids: &[TherapistId],
    ) -> Result<Vec<RecurringSlot>, DbError> {
        let state = self.state.lock().await;
        let mut slots = Vec::new();
        for slot in state.slots.values() {
            if !slot.active || !therapist_ids.contains(&slot.therapist_id) {
                continue;
            }
            match slot.validate() {
                Ok(()) => slots.push(slot.clone()),
                Err(err) => warn!("Skipping recurring slot {}: {}", slot.id, err),
            }
        }
        slots.sort_by_key(|s| (s.therapist_id, s.weekday.num_days_from_monday(), s.start_time));
        Ok(slots)
    }

    async fn find_slot(&self, slot_id: SlotId) -> Result<Option<RecurringSlot>, DbError> {
        Ok(self.state.lock().await.slots.get(&slot_id).cloned())
    }
}

#[async_trait]
impl TherapistDirectory for InMemoryStore {
    async fn find_by_specialization(
        &self,
        specialization: &str,
        language: &str,
    ) -> Result<Vec<Therapist>, DbError> {
        let state = self.state.lock().await;
        Ok(sorted_therapists(state.therapists.values().filter(|t| {
            t.specializations.iter().any(|s| s == specialization)
                && t.languages.iter().any(|l| l == language)
        })))
    }

    async fn find_by_ids(&self, ids: &[TherapistId]) -> Result<Vec<Therapist>, DbError> {
        let state = self.state.lock().await;
        Ok(sorted_therapists(
            state.therapists.values().filter(|t| ids.contains(&t.id)),
        ))
    }
}

#[async_trait]
impl ClientDirectory for InMemoryStore {
    async fn client_exists(&self, client_id: ClientId) -> Result<bool, DbError> {
        Ok(self.state.lock().await.clients.contains(&client_id))
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryStore {
    async fn find_appointment(&self, id: AppointmentId) -> Result<Option<Appointment>, DbError> {
        let state = self.state.lock().await;
        Ok(state
            .appointments
            .get(&id)
            .cloned()
            .map(|a| a.resolve(self.default_appointment_minutes)))
    }

    async fn appointments_in_range(
        &self,
        therapist_ids: &[TherapistId],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        states: &[AppointmentState],
        kinds: KindFilter,
    ) -> Result<Vec<Appointment>, DbError> {
        let state = self.state.lock().await;
        Ok(overlapping(
            &state.appointments,
            therapist_ids,
            from,
            to,
            states,
            kinds,
            None,
            self.default_appointment_minutes,
        ))
    }

    async fn create_appointment(&self, appointment: NewAppointment) -> Result<Appointment, DbError> {
        let stored = StoredAppointment {
            id: Uuid::new_v4(),
            therapist_id: appointment.therapist_id,
            client_id: appointment.client_id,
            kind: appointment.kind,
            start: appointment.start,
            duration_minutes: Some(appointment.duration_minutes),
            client_timezone: appointment.client_timezone,
            state: AppointmentState::Pending,
        };
        debug!("Creating in-memory appointment {}", stored.id);

        self.state
            .lock()
            .await
            .appointments
            .insert(stored.id, stored.clone());
        Ok(stored.resolve(self.default_appointment_minutes))
    }

    async fn update_state(
        &self,
        id: AppointmentId,
        from: AppointmentState,
        to: AppointmentState,
    ) -> Result<bool, DbError> {
        let mut state = self.state.lock().await;
        update_state_in(&mut state.appointments, id, from, to)
    }

    async fn begin(&self) -> Result<Box<dyn AppointmentTransaction>, DbError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.appointments.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            default_appointment_minutes: self.default_appointment_minutes,
        }))
    }
}

/// A transaction over [`InMemoryStore`]
///
/// Holds the store's lock until committed or dropped.
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: HashMap<AppointmentId, StoredAppointment>,
    default_appointment_minutes: i64,
}

#[async_trait]
impl AppointmentTransaction for MemoryTransaction {
    async fn lock_therapist(&mut self, _therapist_id: TherapistId) -> Result<(), DbError> {
        // The store lock is already held.
        Ok(())
    }

    async fn find_appointment(&mut self, id: AppointmentId) -> Result<Option<Appointment>, DbError> {
        Ok(self
            .working
            .get(&id)
            .cloned()
            .map(|a| a.resolve(self.default_appointment_minutes)))
    }

    async fn find_overlapping(
        &mut self,
        therapist_id: TherapistId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        states: &[AppointmentState],
        kinds: KindFilter,
        exclude: Option<AppointmentId>,
    ) -> Result<Vec<Appointment>, DbError> {
        Ok(overlapping(
            &self.working,
            &[therapist_id],
            from,
            to,
            states,
            kinds,
            exclude,
            self.default_appointment_minutes,
        ))
    }

    async fn update_state(
        &mut self,
        id: AppointmentId,
        from: AppointmentState,
        to: AppointmentState,
    ) -> Result<bool, DbError> {
        update_state_in(&mut self.working, id, from, to)
    }

    async fn cancel_pending(&mut self, ids: &[AppointmentId]) -> Result<u64, DbError> {
        let mut cancelled = 0;
        for id in ids {
            if let Some(appointment) = self.working.get_mut(id) {
                if appointment.state == AppointmentState::Pending {
                    appointment.state = AppointmentState::Cancelled;
                    cancelled += 1;
                }
            }
        }
        Ok(cancelled)
    }

    async fn commit(self: Box<Self>) -> Result<(), DbError> {
        let MemoryTransaction {
            mut guard, working, ..
        } = *self;
        guard.appointments = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DbError> {
        Ok(())
    }
}
