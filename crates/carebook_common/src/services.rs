// --- File: crates/carebook_common/src/services.rs ---
//! Service abstractions for external collaborators.
//!
//! Session creation and notification delivery live outside the booking engine.
//! These traits decouple the engine from the concrete implementations and let
//! tests substitute mocks.

use crate::clock::{Clock, SystemClock};
use crate::models::{Appointment, ConfirmationRequest, SessionRecord};
use async_trait::async_trait;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A wrapper error type that implements std::error::Error for Box<dyn std::error::Error + Send + Sync>
#[derive(Debug)]
pub struct BoxedError(pub Box<dyn StdError + Send + Sync>);

impl fmt::Display for BoxedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StdError for BoxedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

impl From<Box<dyn StdError + Send + Sync>> for BoxedError {
    fn from(err: Box<dyn StdError + Send + Sync>) -> Self {
        BoxedError(err)
    }
}

impl From<String> for BoxedError {
    fn from(message: String) -> Self {
        BoxedError(message.into())
    }
}

/// Creates the session record derived from a confirmed appointment.
///
/// Called while the confirmation transaction is still open; an error rolls the
/// confirmation back.
#[async_trait]
pub trait SessionCreator: Send + Sync {
    async fn create_session(
        &self,
        appointment: &Appointment,
        request: &ConfirmationRequest,
    ) -> Result<SessionRecord, BoxedError>;
}

/// Delivers booking notifications after a confirmation has committed.
///
/// Delivery is best-effort: failures are logged by the caller and never undo
/// the confirmation.
#[async_trait]
pub trait BookingNotifier: Send + Sync {
    /// Tells the therapist that `appointment` is confirmed.
    async fn appointment_confirmed(&self, appointment: &Appointment) -> Result<(), BoxedError>;

    /// Reports a pending appointment that lost to a confirmed one.
    async fn appointment_cancelled_by_conflict(
        &self,
        cancelled: &Appointment,
        confirmed: &Appointment,
    ) -> Result<(), BoxedError>;
}

/// Session creator that mints a local session id without calling out, stamped by
/// its clock.
#[derive(Clone)]
pub struct LocalSessionCreator {
    clock: Arc<dyn Clock>,
}

impl LocalSessionCreator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl Default for LocalSessionCreator {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[async_trait]
impl SessionCreator for LocalSessionCreator {
    async fn create_session(
        &self,
        appointment: &Appointment,
        _request: &ConfirmationRequest,
    ) -> Result<SessionRecord, BoxedError> {
        let session_id = format!("session-{}", uuid::Uuid::new_v4());
        debug!(
            "[Session] Created {} for appointment {}",
            session_id, appointment.id
        );
        Ok(SessionRecord {
            session_id,
            appointment_id: appointment.id,
            created_at: self.clock.now(),
        })
    }
}

/// Notifier used when no delivery channel is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl BookingNotifier for LogNotifier {
    async fn appointment_confirmed(&self, appointment: &Appointment) -> Result<(), BoxedError> {
        debug!(
            "[Notify] Appointment {} confirmed for therapist {}",
            appointment.id, appointment.therapist_id
        );
        Ok(())
    }

    async fn appointment_cancelled_by_conflict(
        &self,
        cancelled: &Appointment,
        confirmed: &Appointment,
    ) -> Result<(), BoxedError> {
        debug!(
            "[Notify] Appointment {} cancelled in favour of {}",
            cancelled.id, confirmed.id
        );
        Ok(())
    }
}
