// --- File: crates/carebook_common/src/error.rs ---
use crate::models::AppointmentState;
use std::fmt;
use thiserror::Error;

/// The category of a [`BookingError`].
///
/// Boundary code (HTTP handlers, CLIs) matches exhaustively on the kind instead of
/// comparing error values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    AdmissionConflict,
    ConfirmationConflict,
    InvalidStateTransition,
    Infrastructure,
}

impl ErrorKind {
    /// Business outcomes are returned to the caller and never logged as failures.
    pub fn is_business_outcome(self) -> bool {
        !matches!(self, ErrorKind::Infrastructure)
    }
}

/// The error type of every booking and availability operation.
#[derive(Error, Debug)]
pub enum BookingError {
    /// A required field is missing or malformed. Raised before any read.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced therapist, client, slot or appointment does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The requested time is not inside any currently available range
    #[error("Requested slot is unavailable: {0}")]
    SlotUnavailable(String),

    /// Another appointment overlapping the same window is already confirmed
    #[error("Conflicting appointment already confirmed: {0}")]
    AlreadyConfirmed(String),

    /// The appointment's current state does not allow the requested change
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        from: AppointmentState,
        to: AppointmentState,
    },

    /// Storage or collaborator failure. The outcome of the operation may be unknown.
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

impl BookingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::Validation(_) => ErrorKind::Validation,
            BookingError::NotFound(_) => ErrorKind::NotFound,
            BookingError::SlotUnavailable(_) => ErrorKind::AdmissionConflict,
            BookingError::AlreadyConfirmed(_) => ErrorKind::ConfirmationConflict,
            BookingError::InvalidStateTransition { .. } => ErrorKind::InvalidStateTransition,
            BookingError::Infrastructure(_) => ErrorKind::Infrastructure,
        }
    }
}

/// A trait for converting errors to HTTP status codes.
pub trait HttpStatusCode {
    /// Returns the HTTP status code for this error.
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for ErrorKind {
    fn status_code(&self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::AdmissionConflict => 409,
            ErrorKind::ConfirmationConflict => 409,
            ErrorKind::InvalidStateTransition => 409,
            ErrorKind::Infrastructure => 500,
        }
    }
}

impl HttpStatusCode for BookingError {
    fn status_code(&self) -> u16 {
        self.kind().status_code()
    }
}

/// A trait for adding context to foreign errors.
///
/// The resulting error is always [`BookingError::Infrastructure`].
pub trait Context<T, E> {
    /// Adds context to an error.
    fn context<C>(self, context: C) -> Result<T, BookingError>
    where
        C: fmt::Display + Send + Sync + 'static;

    /// Adds context to an error with a lazy context provider.
    fn with_context<C, F>(self, f: F) -> Result<T, BookingError>
    where
        C: fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E: std::error::Error + Send + Sync + 'static> Context<T, E> for Result<T, E> {
    fn context<C>(self, context: C) -> Result<T, BookingError>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|error| BookingError::Infrastructure(format!("{}: {}", context, error)))
    }

    fn with_context<C, F>(self, f: F) -> Result<T, BookingError>
    where
        C: fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|error| BookingError::Infrastructure(format!("{}: {}", f(), error)))
    }
}

pub fn validation_error<T: fmt::Display>(message: T) -> BookingError {
    BookingError::Validation(message.to_string())
}

pub fn not_found<T: fmt::Display>(message: T) -> BookingError {
    BookingError::NotFound(message.to_string())
}

pub fn slot_unavailable<T: fmt::Display>(message: T) -> BookingError {
    BookingError::SlotUnavailable(message.to_string())
}

pub fn already_confirmed<T: fmt::Display>(message: T) -> BookingError {
    BookingError::AlreadyConfirmed(message.to_string())
}

pub fn infrastructure_error<T: fmt::Display>(message: T) -> BookingError {
    BookingError::Infrastructure(message.to_string())
}
