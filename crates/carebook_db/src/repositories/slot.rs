//! Read access to therapists' recurring slots

use crate::error::DbError;
use async_trait::async_trait;
use carebook_common::models::{RecurringSlot, SlotId, TherapistId};

/// Repository for recurring slots
///
/// Slots are maintained by therapist profile management; the booking engine only reads them.
#[async_trait]
pub trait SlotRepository: Send + Sync {
    /// Active slots of every therapist in `therapist_ids`
    ///
    /// Rows violating the slot invariants are skipped.
    async fn active_slots_for_therapists(
        &self,
        therapist_ids: &[TherapistId],
    ) -> Result<Vec<RecurringSlot>, DbError>;

    /// A slot by id, active or not
    async fn find_slot(&self, slot_id: SlotId) -> Result<Option<RecurringSlot>, DbError>;
}
