//! Repository for regular and ad-hoc appointments
//!
//! Both kinds share one table and one set of operations; queries select kinds
//! through [`KindFilter`]. Durations missing on legacy rows are resolved to the
//! configured default when a row is read.

use crate::error::DbError;
use async_trait::async_trait;
use carebook_common::models::{
    Appointment, AppointmentId, AppointmentState, KindFilter, NewAppointment, TherapistId,
};
use chrono::{DateTime, Utc};

/// Repository for appointments
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    /// Find an appointment by id
    async fn find_appointment(&self, id: AppointmentId) -> Result<Option<Appointment>, DbError>;

    /// Appointments of the given therapists, states and kinds overlapping `[from, to)`
    ///
    /// # Returns
    ///
    /// The matching appointments ordered by start
    async fn appointments_in_range(
        &self,
        therapist_ids: &[TherapistId],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        states: &[AppointmentState],
        kinds: KindFilter,
    ) -> Result<Vec<Appointment>, DbError>;

    /// Persist a new appointment in the `pending` state
    async fn create_appointment(&self, appointment: NewAppointment) -> Result<Appointment, DbError>;

    /// Move one appointment from `from` to `to`
    ///
    /// # Returns
    ///
    /// `false` when the appointment was no longer in `from`
    async fn update_state(
        &self,
        id: AppointmentId,
        from: AppointmentState,
        to: AppointmentState,
    ) -> Result<bool, DbError>;

    /// Begin a transaction over the appointment table
    async fn begin(&self) -> Result<Box<dyn AppointmentTransaction>, DbError>;
}

/// Writes that must happen atomically, used by the confirmation path
///
/// Dropping a transaction without committing discards its writes; callers still roll
/// back explicitly so failures to do so are logged.
#[async_trait]
pub trait AppointmentTransaction: Send {
    /// Serialize with other transactions touching this therapist's appointments
    ///
    /// Must be the first statement of the transaction.
    async fn lock_therapist(&mut self, therapist_id: TherapistId) -> Result<(), DbError>;

    async fn find_appointment(&mut self, id: AppointmentId) -> Result<Option<Appointment>, DbError>;

    /// The therapist's appointments of `states` and `kinds` overlapping `[from, to)`,
    /// without `exclude`
    async fn find_overlapping(
        &mut self,
        therapist_id: TherapistId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        states: &[AppointmentState],
        kinds: KindFilter,
        exclude: Option<AppointmentId>,
    ) -> Result<Vec<Appointment>, DbError>;

    /// Conditional single-row state change, `false` if the row was not in `from`
    async fn update_state(
        &mut self,
        id: AppointmentId,
        from: AppointmentState,
        to: AppointmentState,
    ) -> Result<bool, DbError>;

    /// Cancel every appointment in `ids` that is still pending
    ///
    /// # Returns
    ///
    /// The number of appointments cancelled
    async fn cancel_pending(&mut self, ids: &[AppointmentId]) -> Result<u64, DbError>;

    async fn commit(self: Box<Self>) -> Result<(), DbError>;

    async fn rollback(self: Box<Self>) -> Result<(), DbError>;
}
