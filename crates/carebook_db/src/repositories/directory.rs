//! Lookups into the therapist and client directories

use crate::error::DbError;
use async_trait::async_trait;
use carebook_common::models::{ClientId, Therapist, TherapistId};

/// Therapist directory
///
/// Therapists are selected either by specialization and language or by explicit ids.
#[async_trait]
pub trait TherapistDirectory: Send + Sync {
    /// Therapists offering `specialization` in `language`, ordered by display name
    async fn find_by_specialization(
        &self,
        specialization: &str,
        language: &str,
    ) -> Result<Vec<Therapist>, DbError>;

    /// The therapists among `ids` that exist, ordered by display name
    async fn find_by_ids(&self, ids: &[TherapistId]) -> Result<Vec<Therapist>, DbError>;
}

#[async_trait]
pub trait ClientDirectory: Send + Sync {
    async fn client_exists(&self, client_id: ClientId) -> Result<bool, DbError>;
}
