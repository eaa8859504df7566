//! Storage for Carebook
//!
//! This crate provides the repositories the booking engine reads and writes
//! through, with a SQL implementation on top of `sqlx::Any` and an in-memory one.
//!
//! # Features
//!
//! - SQLite (default) and PostgreSQL through feature flags
//! - Connection pooling configured from [`carebook_config::AppConfig`]
//! - Transactions with a per-therapist write lock for the confirmation path
//! - A unique index on confirmed appointment starts as a last line of defence
//!
//! # Example
//!
//! ```rust,no_run
//! use carebook_config::AppConfig;
//! use carebook_db::SqlStorage;
//!
//! async fn setup_storage(config: &AppConfig) -> Result<SqlStorage, carebook_db::DbError> {
//!     let storage = SqlStorage::connect(config).await?;
//!     storage.init_schema().await?;
//!     Ok(storage)
//! }
//! ```

pub mod client;
pub mod error;
pub mod memory;
pub mod repositories;
mod rows;
pub mod storage;

pub use client::{DbClient, DbTransaction};
pub use error::DbError;
pub use memory::InMemoryStore;
pub use repositories::{
    AppointmentRepository, AppointmentTransaction, ClientDirectory, SlotRepository,
    SqlAppointmentRepository, SqlAppointmentTransaction, SqlDirectory, SqlSlotRepository,
    TherapistDirectory,
};
pub use storage::SqlStorage;
