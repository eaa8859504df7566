//! SQL implementation of the therapist and client directories

use crate::error::DbError;
use crate::repositories::directory::{ClientDirectory, TherapistDirectory};
use crate::rows::{placeholders, string_column, uuid_column};
use crate::DbClient;
use async_trait::async_trait;
use carebook_common::models::{ClientId, Therapist, TherapistId};
use sqlx::any::AnyRow;
use std::collections::HashMap;
use tracing::{debug, error, info};

/// SQL-backed therapist and client directory
#[derive(Debug, Clone)]
pub struct SqlDirectory {
    db_client: DbClient,
}

impl SqlDirectory {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    /// Create the directory tables if they don't exist
    pub async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing directory schema");

        self.db_client
            .execute(
                r#"
                CREATE TABLE IF NOT EXISTS therapists (
                    id TEXT PRIMARY KEY,
                    display_name TEXT NOT NULL
                )
                "#,
            )
            .await?;
        self.db_client
            .execute(
                r#"
                CREATE TABLE IF NOT EXISTS therapist_specializations (
                    therapist_id TEXT NOT NULL,
                    specialization TEXT NOT NULL,
                    PRIMARY KEY (therapist_id, specialization)
                )
                "#,
            )
            .await?;
        self.db_client
            .execute(
                r#"
                CREATE TABLE IF NOT EXISTS therapist_languages (
                    therapist_id TEXT NOT NULL,
                    language TEXT NOT NULL,
                    PRIMARY KEY (therapist_id, language)
                )
                "#,
            )
            .await?;
        self.db_client
            .execute(
                r#"
                CREATE TABLE IF NOT EXISTS clients (
                    id TEXT PRIMARY KEY,
                    display_name TEXT NOT NULL
                )
                "#,
            )
            .await?;

        info!("Directory schema initialized successfully");
        Ok(())
    }

    /// Register a therapist with their specializations and languages
    pub async fn add_therapist(&self, therapist: &Therapist) -> Result<(), DbError> {
        let mut tx = self.db_client.begin().await?;

        sqlx::query("INSERT INTO therapists (id, display_name) VALUES ($1, $2)")
            .bind(therapist.id.to_string())
            .bind(therapist.display_name.clone())
            .execute(&mut *tx)
            .await
            .map_err(DbError::from_write)?;
        for specialization in &therapist.specializations {
            sqlx::query(
                "INSERT INTO therapist_specializations (therapist_id, specialization) VALUES ($1, $2)",
            )
            .bind(therapist.id.to_string())
            .bind(specialization.clone())
            .execute(&mut *tx)
            .await
            .map_err(DbError::from_write)?;
        }
        for language in &therapist.languages {
            sqlx::query("INSERT INTO therapist_languages (therapist_id, language) VALUES ($1, $2)")
                .bind(therapist.id.to_string())
                .bind(language.clone())
                .execute(&mut *tx)
                .await
                .map_err(DbError::from_write)?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionError(e.to_string()))?;
        info!("Registered therapist {}", therapist.id);
        Ok(())
    }

    pub async fn add_client(&self, client_id: ClientId, display_name: &str) -> Result<(), DbError> {
        sqlx::query("INSERT INTO clients (id, display_name) VALUES ($1, $2)")
            .bind(client_id.to_string())
            .bind(display_name.to_string())
            .execute(self.db_client.pool())
            .await
            .map_err(DbError::from_write)?;
        Ok(())
    }

    // Loads specializations and languages for the given therapist rows.
    async fn hydrate(&self, rows: Vec<AnyRow>) -> Result<Vec<Therapist>, DbError> {
        let mut therapists = Vec::with_capacity(rows.len());
        for row in &rows {
            therapists.push(Therapist {
                id: uuid_column(row, "id")?,
                display_name: string_column(row, "display_name")?,
                specializations: Vec::new(),
                languages: Vec::new(),
            });
        }
        if therapists.is_empty() {
            return Ok(therapists);
        }

        let ids: Vec<String> = therapists.iter().map(|t| t.id.to_string()).collect();
        let specializations = self
            .attribute_rows("therapist_specializations", "specialization", &ids)
            .await?;
        let languages = self
            .attribute_rows("therapist_languages", "language", &ids)
            .await?;

        for therapist in &mut therapists {
            if let Some(values) = specializations.get(&therapist.id) {
                therapist.specializations = values.clone();
            }
            if let Some(values) = languages.get(&therapist.id) {
                therapist.languages = values.clone();
            }
        }
        Ok(therapists)
    }

    async fn attribute_rows(
        &self,
        table: &str,
        column: &str,
        ids: &[String],
    ) -> Result<HashMap<TherapistId, Vec<String>>, DbError> {
        let query = format!(
            "SELECT therapist_id, {column} FROM {table} WHERE therapist_id IN ({}) ORDER BY {column}",
            placeholders(1, ids.len())
        );
        let mut statement = sqlx::query(&query);
        for id in ids {
            statement = statement.bind(id.clone());
        }
        let rows = statement
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to load {}: {}", table, e);
                DbError::QueryError(e.to_string())
            })?;

        let mut values: HashMap<TherapistId, Vec<String>> = HashMap::new();
        for row in &rows {
            values
                .entry(uuid_column(row, "therapist_id")?)
                .or_default()
                .push(string_column(row, column)?);
        }
        Ok(values)
    }
}

#[async_trait]
impl TherapistDirectory for SqlDirectory {
    async fn find_by_specialization(
        &self,
        specialization: &str,
        language: &str,
    ) -> Result<Vec<Therapist>, DbError> {
        debug!(
            "Finding therapists for specialization '{}' in '{}'",
            specialization, language
        );

        let rows = sqlx::query(
            r#"
            SELECT t.id, t.display_name FROM therapists t
            WHERE EXISTS (
                SELECT 1 FROM therapist_specializations s
                WHERE s.therapist_id = t.id AND s.specialization = $1
            )
            AND EXISTS (
                SELECT 1 FROM therapist_languages l
                WHERE l.therapist_id = t.id AND l.language = $2
            )
            ORDER BY t.display_name, t.id
            "#,
        )
        .bind(specialization.to_string())
        .bind(language.to_string())
        .fetch_all(self.db_client.pool())
        .await
        .map_err(|e| {
            error!("Failed to find therapists by specialization: {}", e);
            DbError::QueryError(e.to_string())
        })?;

        self.hydrate(rows).await
    }

    async fn find_by_ids(&self, ids: &[TherapistId]) -> Result<Vec<Therapist>, DbError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Finding {} therapist(s) by id", ids.len());

        let query = format!(
            "SELECT id, display_name FROM therapists WHERE id IN ({}) ORDER BY display_name, id",
            placeholders(1, ids.len())
        );
        let mut statement = sqlx::query(&query);
        for id in ids {
            statement = statement.bind(id.to_string());
        }
        let rows = statement
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to find therapists by id: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        self.hydrate(rows).await
    }
}

#[async_trait]
impl ClientDirectory for SqlDirectory {
    async fn client_exists(&self, client_id: ClientId) -> Result<bool, DbError> {
        let row = sqlx::query("SELECT id FROM clients WHERE id = $1")
            .bind(client_id.to_string())
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to look up client: {}", e);
                DbError::QueryError(e.to_string())
            })?;
        Ok(row.is_some())
    }
}
