// --- File: crates/carebook_config/src/models.rs ---

use serde::{Deserialize, Serialize};
use thiserror::Error;

// --- Database Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String, // e.g. sqlite:data/carebook.db, loaded via CAREBOOK__DATABASE__URL
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

// --- Scheduling Config ---
const MINUTES_PER_DAY: i64 = 24 * 60;
const MAX_WINDOW_DAYS: i64 = 366;

/// Tunables of the availability engine.
///
/// All values are minutes or days. The minimum bookable duration is a floor,
/// not a constant: deployments may raise it to hide short fragments.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Free ranges shorter than this are never offered.
    pub min_bookable_minutes: i64,
    /// Duration assumed for legacy appointment rows that carry none.
    pub default_appointment_minutes: i64,
    /// Query window used when the caller supplies no dates.
    pub default_window_days: i64,
    /// Largest window a single availability query may span.
    pub max_window_days: i64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            min_bookable_minutes: 15,
            default_appointment_minutes: 60,
            default_window_days: 14,
            max_window_days: 90,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulingConfigError {
    #[error("scheduling.{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: i64 },
    #[error("scheduling.{field} must be at most {max}, got {value}")]
    TooLarge {
        field: &'static str,
        value: i64,
        max: i64,
    },
    #[error("scheduling.default_window_days ({default}) exceeds max_window_days ({max})")]
    WindowExceedsMax { default: i64, max: i64 },
}

impl SchedulingConfig {
    /// Checks that every tunable is usable by the engine.
    pub fn validate(&self) -> Result<(), SchedulingConfigError> {
        let bounded = [
            ("min_bookable_minutes", self.min_bookable_minutes, MINUTES_PER_DAY),
            ("default_appointment_minutes", self.default_appointment_minutes, MINUTES_PER_DAY),
            ("default_window_days", self.default_window_days, MAX_WINDOW_DAYS),
            ("max_window_days", self.max_window_days, MAX_WINDOW_DAYS),
        ];
        for (field, value, max) in bounded {
            if value <= 0 {
                return Err(SchedulingConfigError::NotPositive { field, value });
            }
            if value > max {
                return Err(SchedulingConfigError::TooLarge { field, value, max });
            }
        }
        if self.default_window_days > self.max_window_days {
            return Err(SchedulingConfigError::WindowExceedsMax {
                default: self.default_window_days,
                max: self.max_window_days,
            });
        }
        Ok(())
    }
}

// --- Logging Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// When set, JSON logs are also written to a daily rolling file in this directory.
    pub directory: Option<String>,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "carebook.log".to_string(),
        }
    }
}

// --- Unified App Configuration ---
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}
