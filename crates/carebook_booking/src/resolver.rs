// --- File: crates/carebook_booking/src/resolver.rs ---
//! Confirmation with conflict resolution.
//!
//! Confirming an appointment cancels every pending appointment of the same therapist
//! that overlaps it, regular or ad-hoc, and is refused while an overlapping one is
//! already confirmed. Detection, cancellation, confirmation and session creation run
//! in one storage transaction that starts by locking the therapist's appointments, so
//! concurrent confirmations for one therapist serialize. Notifications go out only
//! after the commit and never undo it.

use crate::engine::{infrastructure, BookingEngine};
use carebook_availability::overlaps;
use carebook_common::models::{
    Appointment, AppointmentState, ConfirmationOutcome, ConfirmationRequest, KindFilter,
    SessionRecord, TherapistId,
};
use carebook_common::{
    already_confirmed, log_degraded, log_error, not_found, validation_error, BookingError,
};
use carebook_db::AppointmentTransaction;
use tracing::{debug, info, warn};

const OPEN_STATES: [AppointmentState; 2] = [AppointmentState::Pending, AppointmentState::Confirmed];

/// What the transaction did, before it commits
struct Resolution {
    appointment: Appointment,
    session: SessionRecord,
    cancelled: Vec<Appointment>,
}

impl BookingEngine {
    /// Confirm a pending appointment, cancelling the pending appointments it overlaps.
    ///
    /// # Errors
    ///
    /// * [`BookingError::NotFound`] when the appointment does not exist
    /// * [`BookingError::InvalidStateTransition`] when it is not pending
    /// * [`BookingError::AlreadyConfirmed`] when an overlapping appointment is confirmed,
    ///   including one confirmed concurrently
    /// * [`BookingError::Infrastructure`] when storage or session creation fails; the
    ///   transaction is rolled back
    pub async fn confirm_appointment(
        &self,
        request: ConfirmationRequest,
    ) -> Result<ConfirmationOutcome, BookingError> {
        if request.appointment_id.is_nil() {
            return Err(validation_error("appointment id is required"));
        }
        let therapist_id = self.get_appointment(request.appointment_id).await?.therapist_id;

        let mut tx = self
            .appointments
            .begin()
            .await
            .map_err(|e| infrastructure("[Resolver] Failed to begin transaction", e))?;

        let resolution = match self.resolve_in_tx(tx.as_mut(), therapist_id, &request).await {
            Ok(resolution) => resolution,
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    log_error(&rollback_err, "[Resolver] Rollback failed");
                }
                if !err.kind().is_business_outcome() {
                    log_error(&err, "[Resolver] Confirmation failed");
                } else {
                    debug!(
                        "[Resolver] Appointment {} not confirmed: {}",
                        request.appointment_id, err
                    );
                }
                return Err(err);
            }
        };

        tx.commit()
            .await
            .map_err(|e| infrastructure("[Resolver] Commit failed", e))?;

        info!(
            "[Resolver] Confirmed appointment {} and cancelled {} overlapping pending appointment(s)",
            resolution.appointment.id,
            resolution.cancelled.len()
        );

        self.notify_confirmation(&resolution.appointment, &resolution.cancelled)
            .await;

        Ok(ConfirmationOutcome {
            appointment: resolution.appointment,
            session: resolution.session,
            cancelled: resolution.cancelled,
        })
    }

    async fn resolve_in_tx(
        &self,
        tx: &mut dyn AppointmentTransaction,
        therapist_id: TherapistId,
        request: &ConfirmationRequest,
    ) -> Result<Resolution, BookingError> {
        tx.lock_therapist(therapist_id).await?;

        let target = tx
            .find_appointment(request.appointment_id)
            .await?
            .ok_or_else(|| not_found(format!("appointment {}", request.appointment_id)))?;

        let overlapping = self.overlapping_open(tx, &target).await?;
        let confirmed_conflict = overlapping
            .iter()
            .find(|a| a.state == AppointmentState::Confirmed);

        if let Err(err) = target.state.transition_to(AppointmentState::Confirmed) {
            // Cancelled by a competing confirmation that won the window.
            if let (AppointmentState::Cancelled, Some(winner)) = (target.state, confirmed_conflict) {
                return Err(already_confirmed(format!(
                    "appointment {} overlaps confirmed appointment {}",
                    target.id, winner.id
                )));
            }
            return Err(err);
        }
        if let Some(winner) = confirmed_conflict {
            return Err(already_confirmed(format!(
                "appointment {} overlaps confirmed appointment {}",
                target.id, winner.id
            )));
        }

        let pending: Vec<Appointment> = overlapping
            .into_iter()
            .filter(|a| a.state == AppointmentState::Pending)
            .collect();
        let pending_ids: Vec<_> = pending.iter().map(|a| a.id).collect();
        let cancelled_count = tx.cancel_pending(&pending_ids).await?;
        if cancelled_count != pending_ids.len() as u64 {
            warn!(
                "[Resolver] Expected to cancel {} appointment(s), cancelled {}",
                pending_ids.len(),
                cancelled_count
            );
        }

        let confirmed = tx
            .update_state(target.id, AppointmentState::Pending, AppointmentState::Confirmed)
            .await?;
        if !confirmed {
            return Err(BookingError::InvalidStateTransition {
                from: target.state,
                to: AppointmentState::Confirmed,
            });
        }
        let appointment = Appointment {
            state: AppointmentState::Confirmed,
            ..target
        };

        let session = self
            .session_creator()
            .create_session(&appointment, request)
            .await
            .map_err(|e| {
                BookingError::Infrastructure(format!(
                    "session creation for appointment {} failed: {}",
                    appointment.id, e
                ))
            })?;

        let cancelled = pending
            .into_iter()
            .map(|a| Appointment {
                state: AppointmentState::Cancelled,
                ..a
            })
            .collect();

        Ok(Resolution {
            appointment,
            session,
            cancelled,
        })
    }

    /// Pending and confirmed appointments of either kind overlapping `target`
    async fn overlapping_open(
        &self,
        tx: &mut dyn AppointmentTransaction,
        target: &Appointment,
    ) -> Result<Vec<Appointment>, BookingError> {
        let mut found = Vec::new();
        for kinds in [KindFilter::Regular, KindFilter::AdHoc] {
            let candidates = tx
                .find_overlapping(
                    target.therapist_id,
                    target.start,
                    target.end(),
                    &OPEN_STATES,
                    kinds,
                    Some(target.id),
                )
                .await?;
            found.extend(
                candidates
                    .into_iter()
                    .filter(|a| overlaps(target.start, target.end(), a.start, a.end())),
            );
        }
        debug!(
            "[Resolver] {} open appointment(s) overlap {}",
            found.len(),
            target.id
        );
        Ok(found)
    }

    async fn notify_confirmation(&self, confirmed: &Appointment, cancelled: &[Appointment]) {
        if let Err(err) = self.notifier.appointment_confirmed(confirmed).await {
            log_degraded(err, "[Resolver] Confirmation notice failed");
        }
        for bystander in cancelled {
            if let Err(err) = self
                .notifier
                .appointment_cancelled_by_conflict(bystander, confirmed)
                .await
            {
                log_degraded(err, "[Resolver] Cancellation notice failed");
            }
        }
    }
}
