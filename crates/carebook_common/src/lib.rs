// --- File: crates/carebook_common/src/lib.rs ---

// Declare modules within this crate
pub mod clock; // Injectable time source
pub mod error; // Error handling
pub mod logging; // Logging utilities
pub mod models; // Domain data structures
pub mod services; // Collaborator abstractions

// Re-export error types and utilities for easier access
pub use error::{
    already_confirmed, infrastructure_error, not_found, slot_unavailable, validation_error,
    BookingError, Context, ErrorKind, HttpStatusCode,
};

pub use clock::{Clock, FixedClock, SystemClock};

// Re-export logging utilities for easier access
pub use logging::{init, init_from_config, init_with_level, log_degraded, log_error, log_result};

pub use services::{BookingNotifier, BoxedError, LocalSessionCreator, LogNotifier, SessionCreator};

// This crate holds what every other Carebook crate shares: the domain models,
// the closed error taxonomy, logging setup and the external collaborator traits.
