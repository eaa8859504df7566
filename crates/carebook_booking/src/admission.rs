//! Admission of new appointments
//!
//! A regular appointment is admitted only when the freshly computed availability of
//! its therapist contains the requested interval under the requested slot. That single
//! check covers a slot that is inactive, a time already taken by a confirmed
//! appointment and a time past the slot's advance notice.
//!
//! An ad-hoc appointment lives outside recurring slots: it must not overlap any of them,
//! nor any pending or confirmed appointment. Slot buffers do not apply to it.

use crate::engine::{appointment_window, infrastructure, past_calendar_end, BookingEngine};
use carebook_availability::{overlaps, TimeRange};
use carebook_common::models::{
    validate_timezone_hint, AdHocBookingRequest, Appointment, AppointmentKind, AppointmentState,
    BookingRequest, ClientId, KindFilter, NewAppointment, Therapist, TherapistId,
};
use carebook_common::{not_found, slot_unavailable, validation_error, BookingError};
use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, Utc};
use tracing::{debug, info};

const MAX_APPOINTMENT_MINUTES: i64 = 24 * 60;

fn validate_request(
    therapist_id: TherapistId,
    client_id: ClientId,
    duration_minutes: i64,
    client_timezone: Option<&str>,
) -> Result<(), BookingError> {
    if therapist_id.is_nil() {
        return Err(validation_error("therapist id is required"));
    }
    if client_id.is_nil() {
        return Err(validation_error("client id is required"));
    }
    if duration_minutes <= 0 || duration_minutes > MAX_APPOINTMENT_MINUTES {
        return Err(validation_error(format!(
            "duration {duration_minutes} minutes is outside 1..={MAX_APPOINTMENT_MINUTES}"
        )));
    }
    validate_timezone_hint(client_timezone)
}

/// The requested interval and the days whose slots can reach it: from the day before
/// its start (slots crossing midnight) through the day it ends.
fn requested_days(
    start: DateTime<Utc>,
    duration_minutes: i64,
) -> Result<(TimeRange, NaiveDate, NaiveDate), BookingError> {
    let requested = TimeRange::starting_at(start, Duration::minutes(duration_minutes))
        .ok_or_else(|| past_calendar_end(start.date_naive()))?;
    let first_day = requested
        .start
        .date_naive()
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| {
            validation_error(format!("{} is too close to the start of the calendar", start))
        })?;
    let last_day = requested.end.date_naive();
    appointment_window(first_day, last_day)?;
    Ok((requested, first_day, last_day))
}

impl BookingEngine {
    /// Admit a pending appointment inside one of the therapist's recurring slots.
    ///
    /// # Errors
    ///
    /// * [`BookingError::Validation`] for malformed requests
    /// * [`BookingError::NotFound`] when the therapist, client or slot is unknown,
    ///   or the slot belongs to another therapist
    /// * [`BookingError::SlotUnavailable`] when no available range contains the request
    pub async fn create_appointment(
        &self,
        request: BookingRequest,
    ) -> Result<Appointment, BookingError> {
        validate_request(
            request.therapist_id,
            request.client_id,
            request.duration_minutes,
            request.client_timezone.as_deref(),
        )?;
        if request.slot_id.is_nil() {
            return Err(validation_error("slot id is required"));
        }
        let (requested, first_day, last_day) =
            requested_days(request.start, request.duration_minutes)?;

        let therapist = self.load_therapist(request.therapist_id).await?;
        self.ensure_client(request.client_id).await?;
        let slot = self
            .slots
            .find_slot(request.slot_id)
            .await
            .map_err(|e| infrastructure("[Admission] Loading slot failed", e))?
            .filter(|slot| slot.therapist_id == therapist.id)
            .ok_or_else(|| {
                not_found(format!(
                    "slot {} of therapist {}",
                    request.slot_id, therapist.id
                ))
            })?;

        let now = self.clock.now();
        let ranges = self
            .availability_for(std::slice::from_ref(&therapist), first_day, last_day, now)
            .await?;

        let admitted = ranges.iter().any(|range| {
            range.lists(therapist.id, slot.id)
                && TimeRange::new(range.start, range.end).contains(&requested)
        });
        if !admitted {
            debug!(
                "[Admission] {} - {} is not available in slot {} of therapist {}",
                requested.start, requested.end, slot.id, therapist.id
            );
            return Err(slot_unavailable(format!(
                "{} - {} in slot {}",
                requested.start, requested.end, slot.id
            )));
        }

        let appointment = self
            .appointments
            .create_appointment(NewAppointment {
                therapist_id: therapist.id,
                client_id: request.client_id,
                kind: AppointmentKind::Regular { slot_id: slot.id },
                start: requested.start,
                duration_minutes: request.duration_minutes,
                client_timezone: request.client_timezone,
            })
            .await
            .map_err(|e| infrastructure("[Admission] Storing appointment failed", e))?;

        info!(
            "[Admission] Created pending appointment {} for therapist {} at {}",
            appointment.id, appointment.therapist_id, appointment.start
        );
        Ok(appointment)
    }

    /// Admit a pending appointment outside the therapist's recurring slots.
    ///
    /// # Errors
    ///
    /// * [`BookingError::Validation`] for malformed requests or a start in the past
    /// * [`BookingError::NotFound`] when the therapist or client is unknown
    /// * [`BookingError::SlotUnavailable`] when the request overlaps a recurring slot
    ///   or a pending or confirmed appointment
    pub async fn create_adhoc_appointment(
        &self,
        request: AdHocBookingRequest,
    ) -> Result<Appointment, BookingError> {
        validate_request(
            request.therapist_id,
            request.client_id,
            request.duration_minutes,
            request.client_timezone.as_deref(),
        )?;
        let (requested, first_day, last_day) =
            requested_days(request.start, request.duration_minutes)?;
        let now = self.clock.now();
        if request.start < now {
            return Err(validation_error(format!(
                "start {} is in the past",
                request.start
            )));
        }

        let therapist = self.load_therapist(request.therapist_id).await?;
        self.ensure_client(request.client_id).await?;

        let slots = self
            .slots
            .active_slots_for_therapists(&[therapist.id])
            .await
            .map_err(|e| infrastructure("[Admission] Loading recurring slots failed", e))?;
        for day in first_day.iter_days().take_while(|day| *day <= last_day) {
            for slot in slots.iter().filter(|slot| slot.weekday == day.weekday()) {
                let (slot_start, slot_end) = slot.materialize(day);
                if overlaps(requested.start, requested.end, slot_start, slot_end) {
                    debug!(
                        "[Admission] Ad-hoc request {} - {} overlaps slot {} on {}",
                        requested.start, requested.end, slot.id, day
                    );
                    return Err(slot_unavailable(format!(
                        "{} - {} overlaps recurring slot {}",
                        requested.start, requested.end, slot.id
                    )));
                }
            }
        }

        let (from, to) = appointment_window(first_day, last_day)?;
        let existing = self
            .appointments
            .appointments_in_range(
                &[therapist.id],
                from,
                to,
                &[AppointmentState::Pending, AppointmentState::Confirmed],
                KindFilter::Any,
            )
            .await
            .map_err(|e| infrastructure("[Admission] Loading appointments failed", e))?;
        if let Some(conflict) = existing
            .iter()
            .find(|a| overlaps(requested.start, requested.end, a.start, a.end()))
        {
            debug!(
                "[Admission] Ad-hoc request {} - {} overlaps {} appointment {}",
                requested.start, requested.end, conflict.state, conflict.id
            );
            return Err(slot_unavailable(format!(
                "{} - {} overlaps appointment {}",
                requested.start, requested.end, conflict.id
            )));
        }

        let appointment = self
            .appointments
            .create_appointment(NewAppointment {
                therapist_id: therapist.id,
                client_id: request.client_id,
                kind: AppointmentKind::AdHoc,
                start: requested.start,
                duration_minutes: request.duration_minutes,
                client_timezone: request.client_timezone,
            })
            .await
            .map_err(|e| infrastructure("[Admission] Storing appointment failed", e))?;

        info!(
            "[Admission] Created pending ad-hoc appointment {} for therapist {} at {}",
            appointment.id, appointment.therapist_id, appointment.start
        );
        Ok(appointment)
    }

    async fn load_therapist(&self, therapist_id: TherapistId) -> Result<Therapist, BookingError> {
        self.therapists
            .find_by_ids(&[therapist_id])
            .await
            .map_err(|e| infrastructure("[Admission] Therapist lookup failed", e))?
            .into_iter()
            .next()
            .ok_or_else(|| not_found(format!("therapist {therapist_id}")))
    }

    async fn ensure_client(&self, client_id: ClientId) -> Result<(), BookingError> {
        let exists = self
            .clients
            .client_exists(client_id)
            .await
            .map_err(|e| infrastructure("[Admission] Client lookup failed", e))?;
        if exists {
            Ok(())
        } else {
            Err(not_found(format!("client {client_id}")))
        }
    }
}
