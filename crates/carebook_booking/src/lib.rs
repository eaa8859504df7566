//! Booking for Carebook
//!
//! [`BookingEngine`] ties the availability computation to storage:
//!
//! - [`BookingEngine::find_availability`]: bookable ranges across many therapists
//! - [`BookingEngine::create_appointment`] and [`BookingEngine::create_adhoc_appointment`]:
//!   admission of new pending appointments
//! - [`BookingEngine::confirm_appointment`]: confirmation, cancelling the overlapping
//!   pending appointments in the same transaction
//! - [`BookingEngine::cancel_appointment`] and [`BookingEngine::get_appointment`]
//!
//! # Example
//!
//! ```rust,no_run
//! use carebook_booking::BookingEngine;
//! use carebook_common::models::{AvailabilityQuery, TherapistSelector};
//!
//! async fn availability() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = carebook_config::load_config()?;
//!     let engine = BookingEngine::from_config(&config).await?;
//!     let ranges = engine
//!         .find_availability(AvailabilityQuery {
//!             selector: TherapistSelector::BySpecialization {
//!                 specialization: "anxiety".to_string(),
//!                 language: "en".to_string(),
//!             },
//!             window: None,
//!         })
//!         .await?;
//!     println!("{} bookable range(s)", ranges.len());
//!     Ok(())
//! }
//! ```

pub mod admission;
#[cfg(test)]
mod admission_test;
pub mod engine;
pub mod resolver;
#[cfg(test)]
mod test_support;

pub use engine::{BookingEngine, Repositories};
