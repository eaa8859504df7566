//! SQL implementation of the slot repository

use crate::error::DbError;
use crate::repositories::slot::SlotRepository;
use crate::rows::{
    i64_column, placeholders, time_from_minute, uuid_column, weekday_from_index,
};
use crate::DbClient;
use async_trait::async_trait;
use carebook_common::models::{RecurringSlot, SlotId, TherapistId};
use chrono::Timelike;
use sqlx::any::AnyRow;
use tracing::{debug, error, info, warn};

const SLOT_COLUMNS: &str = "id, therapist_id, weekday, start_minute, duration_minutes, \
     advance_notice_minutes, post_session_break_minutes, active";

/// SQL implementation of the slot repository
#[derive(Debug, Clone)]
pub struct SqlSlotRepository {
    db_client: DbClient,
}

impl SqlSlotRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    /// Create the `recurring_slots` table if it doesn't exist
    ///
    /// `weekday` is 0 for Monday through 6 for Sunday, `start_minute` the UTC minute of day.
    pub async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing recurring slot schema");

        self.db_client
            .execute(
                r#"
                CREATE TABLE IF NOT EXISTS recurring_slots (
                    id TEXT PRIMARY KEY,
                    therapist_id TEXT NOT NULL,
                    weekday BIGINT NOT NULL,
                    start_minute BIGINT NOT NULL,
                    duration_minutes BIGINT NOT NULL,
                    advance_notice_minutes BIGINT NOT NULL DEFAULT 0,
                    post_session_break_minutes BIGINT NOT NULL DEFAULT 0,
                    active BIGINT NOT NULL DEFAULT 1
                )
                "#,
            )
            .await?;
        self.db_client
            .execute(
                "CREATE INDEX IF NOT EXISTS idx_recurring_slots_therapist \
                 ON recurring_slots (therapist_id)",
            )
            .await?;

        info!("Recurring slot schema initialized successfully");
        Ok(())
    }

    /// Store a recurring slot
    pub async fn add_slot(&self, slot: &RecurringSlot) -> Result<(), DbError> {
        slot.validate()
            .map_err(|e| DbError::InvalidRecord(e.to_string()))?;

        let start_minute = i64::from(slot.start_time.num_seconds_from_midnight()) / 60;
        sqlx::query(
            "INSERT INTO recurring_slots \
             (id, therapist_id, weekday, start_minute, duration_minutes, \
              advance_notice_minutes, post_session_break_minutes, active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(slot.id.to_string())
        .bind(slot.therapist_id.to_string())
        .bind(i64::from(slot.weekday.num_days_from_monday()))
        .bind(start_minute)
        .bind(slot.duration_minutes)
        .bind(slot.advance_notice_minutes)
        .bind(slot.post_session_break_minutes)
        .bind(i64::from(slot.active))
        .execute(self.db_client.pool())
        .await
        .map_err(|e| {
            error!("Failed to insert recurring slot {}: {}", slot.id, e);
            DbError::from_write(e)
        })?;

        debug!("Stored recurring slot {} for therapist {}", slot.id, slot.therapist_id);
        Ok(())
    }

    fn map_row(row: &AnyRow) -> Result<RecurringSlot, DbError> {
        Ok(RecurringSlot {
            id: uuid_column(row, "id")?,
            therapist_id: uuid_column(row, "therapist_id")?,
            weekday: weekday_from_index(i64_column(row, "weekday")?)?,
            start_time: time_from_minute(i64_column(row, "start_minute")?)?,
            duration_minutes: i64_column(row, "duration_minutes")?,
            advance_notice_minutes: i64_column(row, "advance_notice_minutes")?,
            post_session_break_minutes: i64_column(row, "post_session_break_minutes")?,
            active: i64_column(row, "active")? != 0,
        })
    }
}

#[async_trait]
impl SlotRepository for SqlSlotRepository {
    async fn active_slots_for_therapists(
        &self,
        therapist_ids: &[TherapistId],
    ) -> Result<Vec<RecurringSlot>, DbError> {
        if therapist_ids.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Loading active slots for {} therapist(s)", therapist_ids.len());

        let query = format!(
            "SELECT {SLOT_COLUMNS} FROM recurring_slots \
             WHERE active <> 0 AND therapist_id IN ({}) \
             ORDER BY therapist_id, weekday, start_minute",
            placeholders(1, therapist_ids.len())
        );
        let mut statement = sqlx::query(&query);
        for id in therapist_ids {
            statement = statement.bind(id.to_string());
        }

        let rows = statement
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to load recurring slots: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        let mut slots = Vec::with_capacity(rows.len());
        for row in &rows {
            let slot = Self::map_row(row)?;
            match slot.validate() {
                Ok(()) => slots.push(slot),
                Err(err) => warn!("Skipping recurring slot {}: {}", slot.id, err),
            }
        }
        Ok(slots)
    }

    async fn find_slot(&self, slot_id: SlotId) -> Result<Option<RecurringSlot>, DbError> {
        debug!("Finding recurring slot {}", slot_id);

        let query = format!("SELECT {SLOT_COLUMNS} FROM recurring_slots WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(slot_id.to_string())
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to find recurring slot: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        row.as_ref().map(Self::map_row).transpose()
    }
}
