//! Repository modules for database access
//!
//! Each storage role is a trait with a SQL implementation over [`crate::DbClient`].
//! In-memory implementations live in [`crate::memory`].

pub mod appointment;
pub mod appointment_sql;
pub mod directory;
pub mod directory_sql;
pub mod slot;
pub mod slot_sql;

// Re-export the repository traits and SQL implementations for ease of use
pub use appointment::{AppointmentRepository, AppointmentTransaction};
pub use appointment_sql::{SqlAppointmentRepository, SqlAppointmentTransaction};
pub use directory::{ClientDirectory, TherapistDirectory};
pub use directory_sql::SqlDirectory;
pub use slot::SlotRepository;
pub use slot_sql::SqlSlotRepository;
