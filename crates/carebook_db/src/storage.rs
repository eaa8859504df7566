//! SQL storage assembled from the application configuration

use crate::client::DbClient;
use crate::error::DbError;
use crate::repositories::{SqlAppointmentRepository, SqlDirectory, SqlSlotRepository};
use carebook_config::AppConfig;
use tracing::{debug, info};

/// The SQL repositories sharing one database client
#[derive(Debug, Clone)]
pub struct SqlStorage {
    pub db_client: DbClient,
    pub slots: SqlSlotRepository,
    pub directory: SqlDirectory,
    pub appointments: SqlAppointmentRepository,
}

impl SqlStorage {
    /// Build the repositories over an existing client
    pub fn new(db_client: DbClient, default_appointment_minutes: i64) -> Self {
        Self {
            slots: SqlSlotRepository::new(db_client.clone()),
            directory: SqlDirectory::new(db_client.clone()),
            appointments: SqlAppointmentRepository::new(
                db_client.clone(),
                default_appointment_minutes,
            ),
            db_client,
        }
    }

    /// Connect using the `database` and `scheduling` sections of the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the database section is missing or the connection fails.
    pub async fn connect(config: &AppConfig) -> Result<Self, DbError> {
        debug!("Creating SQL storage from application configuration");
        let db_client = DbClient::new(config).await?;
        Ok(Self::new(
            db_client,
            config.scheduling.default_appointment_minutes,
        ))
    }

    /// Create every table and index if they don't exist
    pub async fn init_schema(&self) -> Result<(), DbError> {
        self.directory.init_schema().await?;
        self.slots.init_schema().await?;
        self.appointments.init_schema().await?;
        info!("Storage schema is ready");
        Ok(())
    }
}
