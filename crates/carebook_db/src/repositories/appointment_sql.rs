//! SQL implementation of the appointment repository
//!
//! Regular and ad-hoc appointments live in one `appointments` table, told apart
//! by `kind`. A partial unique index on `(therapist_id, start_at)` over confirmed
//! rows backs up the confirmation path: two confirmed appointments of one
//! therapist can never start at the same instant, whatever the isolation level.

use crate::client::DbTransaction;
use crate::error::DbError;
use crate::repositories::appointment::{AppointmentRepository, AppointmentTransaction};
use crate::rows::{
    instant_column, optional_i64_column, optional_string_column, optional_uuid_column,
    string_column, uuid_column,
};
use crate::DbClient;
use async_trait::async_trait;
use carebook_common::models::{
    Appointment, AppointmentId, AppointmentKind, AppointmentState, KindFilter, NewAppointment,
    StoredAppointment, TherapistId,
};
use chrono::{DateTime, Utc};
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::Any;
use tracing::{debug, error, info};
use uuid::Uuid;

const APPOINTMENT_COLUMNS: &str =
    "id, therapist_id, client_id, kind, slot_id, start_at, duration_minutes, client_timezone, state";

/// A bind value for queries assembled at runtime
#[derive(Debug, Clone)]
enum Param {
    Text(String),
    Int(i64),
}

/// Numbered parameters in the order they appear in the statement
#[derive(Debug, Default)]
struct Params {
    values: Vec<Param>,
}

impl Params {
    fn push(&mut self, value: Param) -> String {
        self.values.push(value);
        format!("${}", self.values.len())
    }

    fn push_all(&mut self, values: impl IntoIterator<Item = Param>) -> String {
        values
            .into_iter()
            .map(|value| self.push(value))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn bind<'q>(&self, query: &'q str) -> Query<'q, Any, AnyArguments<'q>> {
        self.values
            .iter()
            .fold(sqlx::query(query), |statement, value| match value {
                Param::Text(text) => statement.bind(text.clone()),
                Param::Int(int) => statement.bind(*int),
            })
    }
}

/// Builds the overlap query shared by the repository and its transactions.
///
/// Returns `None` when no state is requested, which can match nothing.
#[allow(clippy::too_many_arguments)]
fn overlap_query(
    therapist_ids: &[TherapistId],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    states: &[AppointmentState],
    kinds: KindFilter,
    exclude: Option<AppointmentId>,
    default_minutes: i64,
) -> Option<(String, Params)> {
    if therapist_ids.is_empty() || states.is_empty() {
        return None;
    }

    let mut params = Params::default();
    let therapists = params.push_all(therapist_ids.iter().map(|id| Param::Text(id.to_string())));
    let to_param = params.push(Param::Int(to.timestamp()));
    let default_param = params.push(Param::Int(default_minutes));
    let from_param = params.push(Param::Int(from.timestamp()));
    let state_params = params.push_all(states.iter().map(|s| Param::Text(s.as_str().to_string())));

    let mut sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments \
         WHERE therapist_id IN ({therapists}) \
         AND start_at < {to_param} \
         AND start_at + COALESCE(duration_minutes, {default_param}) * 60 > {from_param} \
         AND state IN ({state_params})"
    );
    match kinds {
        KindFilter::Any => {}
        KindFilter::Regular => {
            let kind = params.push(Param::Text("regular".to_string()));
            sql.push_str(&format!(" AND kind = {kind}"));
        }
        KindFilter::AdHoc => {
            let kind = params.push(Param::Text("adhoc".to_string()));
            sql.push_str(&format!(" AND kind = {kind}"));
        }
    }
    if let Some(id) = exclude {
        let excluded = params.push(Param::Text(id.to_string()));
        sql.push_str(&format!(" AND id <> {excluded}"));
    }
    sql.push_str(" ORDER BY start_at, id");

    Some((sql, params))
}

fn map_row(row: &AnyRow, default_minutes: i64) -> Result<Appointment, DbError> {
    let kind = match string_column(row, "kind")?.as_str() {
        "regular" => {
            let slot_id = optional_uuid_column(row, "slot_id")?.ok_or_else(|| {
                DbError::MappingError("regular appointment without slot_id".to_string())
            })?;
            AppointmentKind::Regular { slot_id }
        }
        "adhoc" => AppointmentKind::AdHoc,
        other => {
            return Err(DbError::MappingError(format!(
                "unknown appointment kind '{other}'"
            )))
        }
    };
    let state = string_column(row, "state")?
        .parse::<AppointmentState>()
        .map_err(DbError::MappingError)?;

    let stored = StoredAppointment {
        id: uuid_column(row, "id")?,
        therapist_id: uuid_column(row, "therapist_id")?,
        client_id: uuid_column(row, "client_id")?,
        kind,
        start: instant_column(row, "start_at")?,
        duration_minutes: optional_i64_column(row, "duration_minutes")?,
        client_timezone: optional_string_column(row, "client_timezone")?,
        state,
    };
    Ok(stored.resolve(default_minutes))
}

fn map_rows(rows: &[AnyRow], default_minutes: i64) -> Result<Vec<Appointment>, DbError> {
    rows.iter().map(|row| map_row(row, default_minutes)).collect()
}

/// SQL implementation of the appointment repository
#[derive(Debug, Clone)]
pub struct SqlAppointmentRepository {
    db_client: DbClient,
    default_appointment_minutes: i64,
}

impl SqlAppointmentRepository {
    /// Create a new repository
    ///
    /// # Arguments
    ///
    /// * `db_client` - The database client
    /// * `default_appointment_minutes` - Duration assumed for rows stored without one
    pub fn new(db_client: DbClient, default_appointment_minutes: i64) -> Self {
        Self {
            db_client,
            default_appointment_minutes,
        }
    }

    /// Create the `appointments` table and its indexes if they don't exist
    pub async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing appointment schema");

        self.db_client
            .execute(
                r#"
                CREATE TABLE IF NOT EXISTS appointments (
                    id TEXT PRIMARY KEY,
                    therapist_id TEXT NOT NULL,
                    client_id TEXT NOT NULL,
                    kind TEXT NOT NULL,
                    slot_id TEXT,
                    start_at BIGINT NOT NULL,
                    duration_minutes BIGINT,
                    client_timezone TEXT,
                    state TEXT NOT NULL,
                    updated_at BIGINT NOT NULL
                )
                "#,
            )
            .await?;
        self.db_client
            .execute(
                "CREATE INDEX IF NOT EXISTS idx_appointments_therapist_start \
                 ON appointments (therapist_id, start_at)",
            )
            .await?;
        self.db_client
            .execute(
                "CREATE UNIQUE INDEX IF NOT EXISTS ux_appointments_confirmed_start \
                 ON appointments (therapist_id, start_at) WHERE state = 'confirmed'",
            )
            .await?;

        info!("Appointment schema initialized successfully");
        Ok(())
    }

    /// Store an appointment row as-is, including a missing duration
    ///
    /// Used to import existing bookings; new bookings go through
    /// [`AppointmentRepository::create_appointment`].
    pub async fn insert_stored(&self, appointment: &StoredAppointment) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO appointments \
             (id, therapist_id, client_id, kind, slot_id, start_at, duration_minutes, \
              client_timezone, state, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(appointment.id.to_string())
        .bind(appointment.therapist_id.to_string())
        .bind(appointment.client_id.to_string())
        .bind(appointment.kind.as_str())
        .bind(appointment.kind.slot_id().map(|id| id.to_string()))
        .bind(appointment.start.timestamp())
        .bind(appointment.duration_minutes)
        .bind(appointment.client_timezone.clone())
        .bind(appointment.state.as_str())
        .bind(Utc::now().timestamp())
        .execute(self.db_client.pool())
        .await
        .map_err(|e| {
            error!("Failed to insert appointment {}: {}", appointment.id, e);
            DbError::from_write(e)
        })?;
        Ok(())
    }
}

#[async_trait]
impl AppointmentRepository for SqlAppointmentRepository {
    async fn find_appointment(&self, id: AppointmentId) -> Result<Option<Appointment>, DbError> {
        debug!("Finding appointment {}", id);

        let query = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to find appointment: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        row.as_ref()
            .map(|row| map_row(row, self.default_appointment_minutes))
            .transpose()
    }

    async fn appointments_in_range(
        &self,
        therapist_ids: &[TherapistId],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        states: &[AppointmentState],
        kinds: KindFilter,
    ) -> Result<Vec<Appointment>, DbError> {
        let Some((sql, params)) = overlap_query(
            therapist_ids,
            from,
            to,
            states,
            kinds,
            None,
            self.default_appointment_minutes,
        ) else {
            return Ok(Vec::new());
        };

        let rows = params
            .bind(&sql)
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to load appointments in range: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        map_rows(&rows, self.default_appointment_minutes)
    }

    async fn create_appointment(&self, appointment: NewAppointment) -> Result<Appointment, DbError> {
        let created = Appointment {
            id: Uuid::new_v4(),
            therapist_id: appointment.therapist_id,
            client_id: appointment.client_id,
            kind: appointment.kind,
            start: appointment.start,
            duration_minutes: appointment.duration_minutes,
            client_timezone: appointment.client_timezone,
            state: AppointmentState::Pending,
        };
        debug!(
            "Creating {} appointment {} for therapist {}",
            created.kind.as_str(),
            created.id,
            created.therapist_id
        );

        self.insert_stored(&StoredAppointment {
            id: created.id,
            therapist_id: created.therapist_id,
            client_id: created.client_id,
            kind: created.kind,
            start: created.start,
            duration_minutes: Some(created.duration_minutes),
            client_timezone: created.client_timezone.clone(),
            state: created.state,
        })
        .await?;

        Ok(created)
    }

    async fn update_state(
        &self,
        id: AppointmentId,
        from: AppointmentState,
        to: AppointmentState,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            "UPDATE appointments SET state = $1, updated_at = $2 WHERE id = $3 AND state = $4",
        )
        .bind(to.as_str())
        .bind(Utc::now().timestamp())
        .bind(id.to_string())
        .bind(from.as_str())
        .execute(self.db_client.pool())
        .await
        .map_err(DbError::from_write)?;

        Ok(result.rows_affected() == 1)
    }

    async fn begin(&self) -> Result<Box<dyn AppointmentTransaction>, DbError> {
        let tx = self.db_client.begin().await?;
        Ok(Box::new(SqlAppointmentTransaction {
            tx,
            default_appointment_minutes: self.default_appointment_minutes,
        }))
    }
}

/// An open database transaction over the appointment table
pub struct SqlAppointmentTransaction {
    tx: DbTransaction,
    default_appointment_minutes: i64,
}

#[async_trait]
impl AppointmentTransaction for SqlAppointmentTransaction {
    async fn lock_therapist(&mut self, therapist_id: TherapistId) -> Result<(), DbError> {
        // A no-op write: takes SQLite's write lock, row locks on PostgreSQL.
        sqlx::query("UPDATE appointments SET updated_at = updated_at WHERE therapist_id = $1")
            .bind(therapist_id.to_string())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                error!("Failed to lock appointments of therapist {}: {}", therapist_id, e);
                DbError::TransactionError(e.to_string())
            })?;
        Ok(())
    }

    async fn find_appointment(&mut self, id: AppointmentId) -> Result<Option<Appointment>, DbError> {
        let query = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;

        row.as_ref()
            .map(|row| map_row(row, self.default_appointment_minutes))
            .transpose()
    }

    async fn find_overlapping(
        &mut self,
        therapist_id: TherapistId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        states: &[AppointmentState],
        kinds: KindFilter,
        exclude: Option<AppointmentId>,
    ) -> Result<Vec<Appointment>, DbError> {
        let Some((sql, params)) = overlap_query(
            &[therapist_id],
            from,
            to,
            states,
            kinds,
            exclude,
            self.default_appointment_minutes,
        ) else {
            return Ok(Vec::new());
        };

        let rows = params
            .bind(&sql)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;

        map_rows(&rows, self.default_appointment_minutes)
    }

    async fn update_state(
        &mut self,
        id: AppointmentId,
        from: AppointmentState,
        to: AppointmentState,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            "UPDATE appointments SET state = $1, updated_at = $2 WHERE id = $3 AND state = $4",
        )
        .bind(to.as_str())
        .bind(Utc::now().timestamp())
        .bind(id.to_string())
        .bind(from.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from_write)?;

        Ok(result.rows_affected() == 1)
    }

    async fn cancel_pending(&mut self, ids: &[AppointmentId]) -> Result<u64, DbError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut params = Params::default();
        let updated_at = params.push(Param::Int(Utc::now().timestamp()));
        let id_params = params.push_all(ids.iter().map(|id| Param::Text(id.to_string())));
        let sql = format!(
            "UPDATE appointments SET state = 'cancelled', updated_at = {updated_at} \
             WHERE state = 'pending' AND id IN ({id_params})"
        );

        let result = params
            .bind(&sql)
            .execute(&mut *self.tx)
            .await
            .map_err(DbError::from_write)?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), DbError> {
        self.tx.commit().await.map_err(DbError::from_write)
    }

    async fn rollback(self: Box<Self>) -> Result<(), DbError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| DbError::TransactionError(e.to_string()))
    }
}
